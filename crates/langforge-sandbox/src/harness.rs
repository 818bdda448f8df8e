//! Loading and invoking interpreter modules.
//!
//! The build service links generated interpreters against a small host ABI
//! (module `env`): `source_read`, `out_write`, `err_write`, `exit`, and the
//! `file_*` family. The harness supplies those imports from the session
//! state, so a module can only ever observe its own session.

use std::fmt;
use std::rc::Rc;

use langforge_core::LanguagePackage;
use wasmi::{Caller, Engine, Extern, Instance, Linker, Module, Store};

use crate::error::SandboxError;
use crate::session::{SessionState, SharedFiles, OUTPUT_FILE, PROGRAM_FILE};

/// Entry point export for interactive-mode modules.
const MAIN_EXPORT: &str = "main";
/// Entry point export for file-argument-mode modules.
const MAIN_FILE_EXPORT: &str = "main_file";
/// Allocation export used to place the program path into guest memory.
const ALLOC_EXPORT: &str = "alloc";
/// Linear memory export.
const MEMORY_EXPORT: &str = "memory";

/// Code-carrying termination raised by the `exit` host import.
///
/// Distinguished from genuine faults when classifying the call result: an
/// exit trap records the session exit code instead of failing the session.
#[derive(Debug)]
struct ExitStatus(i32);

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

impl wasmi::errors::HostError for ExitStatus {}

/// How a module expects to receive the user program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// `main: () -> i32`; program bytes arrive via `source_read`.
    Interactive,
    /// `main_file: (ptr, len) -> i32`; program is written to a virtual
    /// file whose path is passed in guest memory.
    FileArgument,
}

/// Terminal outcome of one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The program ran to completion (possibly via the exit trap).
    Completed { transcript: String, exit_code: i32 },
    /// The invocation raised an unexpected fault.
    Failed { diagnostic: String },
}

/// A loaded interpreter module.
///
/// Supports exactly one active program run at a time (`run_program` takes
/// `&mut self`); concurrent runs require independently loaded instances.
pub struct Interpreter {
    engine: Engine,
    module: Module,
    convention: CallingConvention,
    files: SharedFiles,
}

/// Raw capture of one invocation, before transcript assembly.
struct RawRun {
    call: Result<i32, String>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    output_file: Option<Vec<u8>>,
}

impl RawRun {
    fn failed(diagnostic: String) -> Self {
        RawRun {
            call: Err(diagnostic),
            stdout: Vec::new(),
            stderr: Vec::new(),
            output_file: None,
        }
    }
}

impl Interpreter {
    /// Loads the interpreter module from a built package.
    ///
    /// Fails with [`SandboxError::ModuleLoad`] when the bytes are not a
    /// valid module and [`SandboxError::MissingEntryPoint`] when neither
    /// calling convention's entry point is exported.
    pub fn load(package: &LanguagePackage) -> Result<Self, SandboxError> {
        let engine = Engine::default();
        let module = Module::new(&engine, &package.module[..]).map_err(|err| {
            SandboxError::ModuleLoad {
                reason: err.to_string(),
            }
        })?;

        let convention = inspect_convention(&module)?;

        Ok(Interpreter {
            engine,
            module,
            convention,
            files: SharedFiles::default(),
        })
    }

    /// The calling convention selected at load time.
    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    /// Number of files currently in the session file table. Zero between
    /// sessions: every run removes its files on every exit path.
    pub fn virtual_file_count(&self) -> usize {
        self.files.borrow().len()
    }

    /// Runs one user program to a terminal outcome.
    ///
    /// Never panics and never returns an unresolved fault: every path ends
    /// in `Completed` or `Failed`, and the session's virtual files are
    /// removed before returning.
    pub fn run_program(&mut self, program: &str) -> SessionOutcome {
        self.files.borrow_mut().reset();
        let raw = self.invoke(program);
        let outcome = match raw.call {
            Ok(exit_code) => SessionOutcome::Completed {
                transcript: assemble_transcript(
                    &raw.stdout,
                    &raw.stderr,
                    raw.output_file.as_deref(),
                    exit_code,
                ),
                exit_code,
            },
            Err(message) => {
                let mut diagnostic = message;
                if !raw.stderr.is_empty() {
                    diagnostic.push_str("\n--- STDERR ---\n");
                    diagnostic.push_str(&String::from_utf8_lossy(&raw.stderr));
                }
                SessionOutcome::Failed { diagnostic }
            }
        };
        self.files.borrow_mut().reset();
        outcome
    }

    fn invoke(&self, program: &str) -> RawRun {
        let mut linker = Linker::<SessionState>::new(&self.engine);
        if let Err(err) = link_host_abi(&mut linker) {
            return RawRun::failed(format!("host ABI setup failed: {err}"));
        }

        let state = SessionState::new(program, Rc::clone(&self.files));
        let mut store = Store::new(&self.engine, state);

        let instance = match linker
            .instantiate(&mut store, &self.module)
            .and_then(|pre| pre.start(&mut store))
        {
            Ok(instance) => instance,
            Err(err) => return RawRun::failed(format!("module instantiation failed: {err}")),
        };

        let call = self.call_entry(&instance, &mut store, program);

        let state = store.into_data();
        let output_file = state
            .files
            .borrow()
            .contents(OUTPUT_FILE)
            .map(<[u8]>::to_vec);
        RawRun {
            call,
            stdout: state.stdout,
            stderr: state.stderr,
            output_file,
        }
    }

    fn call_entry(
        &self,
        instance: &Instance,
        store: &mut Store<SessionState>,
        program: &str,
    ) -> Result<i32, String> {
        let result = match self.convention {
            CallingConvention::Interactive => {
                let main = instance
                    .get_typed_func::<(), i32>(&*store, MAIN_EXPORT)
                    .map_err(|err| err.to_string())?;
                main.call(&mut *store, ())
            }
            CallingConvention::FileArgument => {
                store
                    .data()
                    .files
                    .borrow_mut()
                    .create(PROGRAM_FILE, program.as_bytes());

                let alloc = instance
                    .get_typed_func::<i32, i32>(&*store, ALLOC_EXPORT)
                    .map_err(|err| err.to_string())?;
                let path = PROGRAM_FILE.as_bytes();
                let ptr = alloc
                    .call(&mut *store, path.len() as i32)
                    .map_err(|err| format!("path allocation failed: {err}"))?;

                let memory = instance
                    .get_memory(&*store, MEMORY_EXPORT)
                    .ok_or_else(|| format!("module exports no '{MEMORY_EXPORT}'"))?;
                memory
                    .write(&mut *store, ptr as usize, path)
                    .map_err(|err| format!("writing program path failed: {err}"))?;

                let main_file = instance
                    .get_typed_func::<(i32, i32), i32>(&*store, MAIN_FILE_EXPORT)
                    .map_err(|err| err.to_string())?;
                main_file.call(&mut *store, (ptr, path.len() as i32))
            }
        };

        match result {
            Ok(code) => Ok(code),
            Err(err) => match err.downcast_ref::<ExitStatus>() {
                Some(exit) => Ok(exit.0),
                None => Err(err.to_string()),
            },
        }
    }
}

/// Selects the calling convention from the module's exports.
fn inspect_convention(module: &Module) -> Result<CallingConvention, SandboxError> {
    let mut has_main = false;
    for export in module.exports() {
        let is_func = matches!(export.ty(), wasmi::ExternType::Func(_));
        if is_func {
            match export.name() {
                MAIN_FILE_EXPORT => return Ok(CallingConvention::FileArgument),
                MAIN_EXPORT => has_main = true,
                _ => {}
            }
        }
    }
    if has_main {
        Ok(CallingConvention::Interactive)
    } else {
        Err(SandboxError::MissingEntryPoint)
    }
}

/// Defines the `env` host imports backing the sandbox ABI.
fn link_host_abi(
    linker: &mut Linker<SessionState>,
) -> Result<(), wasmi::errors::LinkerError> {
    linker.func_wrap("env", "source_read", |mut caller: Caller<'_, SessionState>| -> i32 {
        caller
            .data_mut()
            .input
            .next()
            .map(i32::from)
            .unwrap_or(-1)
    })?;

    linker.func_wrap(
        "env",
        "out_write",
        |mut caller: Caller<'_, SessionState>, byte: i32| {
            caller.data_mut().stdout.push(byte as u8);
        },
    )?;

    linker.func_wrap(
        "env",
        "err_write",
        |mut caller: Caller<'_, SessionState>, byte: i32| {
            caller.data_mut().stderr.push(byte as u8);
        },
    )?;

    linker.func_wrap(
        "env",
        "exit",
        |_caller: Caller<'_, SessionState>, code: i32| -> Result<(), wasmi::Error> {
            Err(wasmi::Error::host(ExitStatus(code)))
        },
    )?;

    linker.func_wrap(
        "env",
        "file_open",
        |mut caller: Caller<'_, SessionState>, ptr: i32, len: i32, mode: i32| -> i32 {
            let Some(memory) = caller.get_export(MEMORY_EXPORT).and_then(Extern::into_memory)
            else {
                return -1;
            };
            let mut buf = vec![0u8; len.max(0) as usize];
            if memory.read(&caller, ptr.max(0) as usize, &mut buf).is_err() {
                return -1;
            }
            let Ok(name) = String::from_utf8(buf) else {
                return -1;
            };
            caller.data_mut().files.borrow_mut().open(&name, mode)
        },
    )?;

    linker.func_wrap(
        "env",
        "file_read",
        |mut caller: Caller<'_, SessionState>, fd: i32| -> i32 {
            caller.data_mut().files.borrow_mut().read(fd)
        },
    )?;

    linker.func_wrap(
        "env",
        "file_write",
        |mut caller: Caller<'_, SessionState>, fd: i32, byte: i32| {
            caller.data_mut().files.borrow_mut().write(fd, byte as u8);
        },
    )?;

    linker.func_wrap(
        "env",
        "file_close",
        |mut caller: Caller<'_, SessionState>, fd: i32| {
            caller.data_mut().files.borrow_mut().close(fd);
        },
    )?;

    Ok(())
}

/// Orders the captured streams into the final transcript.
fn assemble_transcript(
    stdout: &[u8],
    stderr: &[u8],
    output_file: Option<&[u8]>,
    exit_code: i32,
) -> String {
    let mut transcript = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !transcript.is_empty() {
            transcript.push('\n');
        }
        transcript.push_str("--- STDERR ---\n");
        transcript.push_str(&String::from_utf8_lossy(stderr));
    }
    if let Some(contents) = output_file {
        if !transcript.is_empty() {
            transcript.push('\n');
        }
        transcript.push_str("--- OUTPUT FILE ---\n");
        transcript.push_str(&String::from_utf8_lossy(contents));
    }
    if transcript.trim().is_empty() {
        transcript = format!("program completed with exit code {exit_code} and produced no output");
    }
    transcript
}
