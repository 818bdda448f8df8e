//! Shared test support: scripted generator/build stubs and fixtures.
#![allow(dead_code)] // not every test target uses every helper

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use langforge_core::bundle::ArtifactBundle;
use langforge_core::LanguagePackage;
use langforge_server::builder::{BuildOutcome, BuildService};
use langforge_server::generator::Generator;
use langforge_server::pipeline::PipelineError;

/// A model response carrying all five required artifacts, well-formed.
pub fn well_formed_blob() -> String {
    "\
===FILE parser.y===
%{ #include \"lex.h\" %}
%%
program: statement ;
%%
===END===
===FILE flex.l===
%{ #include \"y.tab.h\" %}
%%
[0-9]+ { return NUMBER; }
%%
===END===
===FILE interpreter.c===
#include <stdio.h>
int main(int argc, char **argv) { return yyparse(); }
===END===
===FILE README.md===
A tiny calculator language with integer arithmetic.
===END===
===FILE example.txt===
print 1 + 2;
print 3 * 4;
===END===
"
    .to_string()
}

/// Encoded bytes of a complete, decodable package.
pub fn test_package_bytes() -> Vec<u8> {
    LanguagePackage {
        interpreter_source: "int main(void) { return 0; }".into(),
        loader_script: "linked against the sandbox host ABI".into(),
        module: vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00],
        readme: "# test language".into(),
        example: "print 1;".into(),
    }
    .encode()
}

/// Package bytes whose manifest lacks the interpreter module.
pub fn incomplete_package_bytes() -> Vec<u8> {
    let mut manifest: serde_json::Value =
        serde_json::from_slice(&test_package_bytes()).expect("manifest json");
    manifest["entries"]
        .as_object_mut()
        .expect("entries object")
        .remove("interpreter.wasm");
    serde_json::to_vec(&manifest).expect("re-encode")
}

/// Scripted [`Generator`]: pops queued responses, falling back to a
/// default, and records every prompt it receives.
pub struct StubGenerator {
    prompts: Mutex<Vec<String>>,
    queue: Mutex<VecDeque<Result<String, String>>>,
    default: Result<String, String>,
}

impl StubGenerator {
    /// Always answers with `response`.
    pub fn always(response: String) -> Self {
        Self::scripted(Vec::new(), Ok(response))
    }

    /// Pops from `queue` first; answers `default` once it is empty.
    /// `Err` entries become transient faults.
    pub fn scripted(queue: Vec<Result<String, String>>, default: Result<String, String>) -> Self {
        StubGenerator {
            prompts: Mutex::new(Vec::new()),
            queue: Mutex::new(queue.into()),
            default,
        }
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        next.map_err(PipelineError::Transient)
    }
}

/// Scripted [`BuildService`]: pops queued outcomes, falling back to a
/// default, and counts invocations. `Err` entries become transient faults.
pub struct StubBuilder {
    calls: Mutex<u32>,
    queue: Mutex<VecDeque<Result<BuildOutcome, String>>>,
    default: Result<BuildOutcome, String>,
}

impl StubBuilder {
    /// Always answers with `outcome`.
    pub fn always(outcome: BuildOutcome) -> Self {
        Self::scripted(Vec::new(), Ok(outcome))
    }

    /// Pops from `queue` first; answers `default` once it is empty.
    pub fn scripted(
        queue: Vec<Result<BuildOutcome, String>>,
        default: Result<BuildOutcome, String>,
    ) -> Self {
        StubBuilder {
            calls: Mutex::new(0),
            queue: Mutex::new(queue.into()),
            default,
        }
    }

    /// Number of build invocations so far.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl BuildService for StubBuilder {
    async fn build(&self, _bundle: &ArtifactBundle) -> Result<BuildOutcome, PipelineError> {
        *self.calls.lock().unwrap() += 1;
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        next.map_err(PipelineError::Transient)
    }
}
