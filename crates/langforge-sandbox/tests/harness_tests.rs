//! End-to-end harness tests against hand-assembled interpreter modules.
//!
//! Each test emits a minimal wasm module with `wasm-encoder`, wraps it in a
//! `LanguagePackage`, and drives it through the real load/run path: host
//! ABI linking, calling-convention selection, capture, classification, and
//! cleanup.

use langforge_core::LanguagePackage;
use langforge_sandbox::{CallingConvention, Interpreter, SandboxError, SessionOutcome};
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, ImportSection, Instruction, MemorySection, MemoryType, Module,
    TypeSection, ValType,
};

fn package_with(module: Vec<u8>) -> LanguagePackage {
    LanguagePackage {
        interpreter_source: "int main(void) { return 0; }".into(),
        loader_script: "linked against the sandbox host ABI".into(),
        module,
        readme: "# test language".into(),
        example: "noop".into(),
    }
}

fn test_memory() -> MemoryType {
    MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    }
}

/// Interactive module: writes "hello" to stdout, returns 0.
fn hello_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function([ValType::I32], []); // 0: out_write
    types.ty().function([], [ValType::I32]); // 1: main

    let mut imports = ImportSection::new();
    imports.import("env", "out_write", EntityType::Function(0));

    let mut functions = FunctionSection::new();
    functions.function(1);

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 1);

    let mut main = Function::new([]);
    for byte in b"hello" {
        main.instruction(&Instruction::I32Const(i32::from(*byte)));
        main.instruction(&Instruction::Call(0));
    }
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// Interactive module: copies the virtual input stream to stdout.
fn echo_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function([], [ValType::I32]); // 0: source_read / main
    types.ty().function([ValType::I32], []); // 1: out_write

    let mut imports = ImportSection::new();
    imports.import("env", "source_read", EntityType::Function(0));
    imports.import("env", "out_write", EntityType::Function(1));

    let mut functions = FunctionSection::new();
    functions.function(0);

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 2);

    let mut main = Function::new([(1, ValType::I32)]);
    main.instruction(&Instruction::Block(BlockType::Empty));
    main.instruction(&Instruction::Loop(BlockType::Empty));
    main.instruction(&Instruction::Call(0)); // source_read
    main.instruction(&Instruction::LocalTee(0));
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::I32LtS);
    main.instruction(&Instruction::BrIf(1)); // end of stream
    main.instruction(&Instruction::LocalGet(0));
    main.instruction(&Instruction::Call(1)); // out_write
    main.instruction(&Instruction::Br(0));
    main.instruction(&Instruction::End);
    main.instruction(&Instruction::End);
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// Interactive module whose body is a single unreachable trap.
fn trapping_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function([], [ValType::I32]);

    let mut functions = FunctionSection::new();
    functions.function(0);

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 0);

    let mut main = Function::new([]);
    main.instruction(&Instruction::Unreachable);
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// Interactive module that terminates through the `exit` host import.
fn exit_module(status: i32) -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function([ValType::I32], []); // 0: exit
    types.ty().function([], [ValType::I32]); // 1: main

    let mut imports = ImportSection::new();
    imports.import("env", "exit", EntityType::Function(0));

    let mut functions = FunctionSection::new();
    functions.function(1);

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 1);

    let mut main = Function::new([]);
    main.instruction(&Instruction::I32Const(status));
    main.instruction(&Instruction::Call(0));
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// Interactive module that writes "err" to stderr and returns 1.
fn stderr_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function([ValType::I32], []); // 0: err_write
    types.ty().function([], [ValType::I32]); // 1: main

    let mut imports = ImportSection::new();
    imports.import("env", "err_write", EntityType::Function(0));

    let mut functions = FunctionSection::new();
    functions.function(1);

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 1);

    let mut main = Function::new([]);
    for byte in b"err" {
        main.instruction(&Instruction::I32Const(i32::from(*byte)));
        main.instruction(&Instruction::Call(0));
    }
    main.instruction(&Instruction::I32Const(1));
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// File-argument module: opens the path it is given, copies the file to
/// stdout, closes it.
fn file_mode_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types
        .ty()
        .function([ValType::I32, ValType::I32, ValType::I32], [ValType::I32]); // 0: file_open
    types.ty().function([ValType::I32], [ValType::I32]); // 1: file_read / alloc
    types.ty().function([ValType::I32], []); // 2: out_write / file_close
    types
        .ty()
        .function([ValType::I32, ValType::I32], [ValType::I32]); // 3: main_file

    let mut imports = ImportSection::new();
    imports.import("env", "file_open", EntityType::Function(0));
    imports.import("env", "file_read", EntityType::Function(1));
    imports.import("env", "out_write", EntityType::Function(2));
    imports.import("env", "file_close", EntityType::Function(2));

    let mut functions = FunctionSection::new();
    functions.function(1); // 4: alloc
    functions.function(3); // 5: main_file

    let mut memories = MemorySection::new();
    memories.memory(test_memory());

    let mut exports = ExportSection::new();
    exports.export("alloc", ExportKind::Func, 4);
    exports.export("main_file", ExportKind::Func, 5);
    exports.export("memory", ExportKind::Memory, 0);

    // alloc: hand out a fixed scratch offset.
    let mut alloc = Function::new([]);
    alloc.instruction(&Instruction::I32Const(1024));
    alloc.instruction(&Instruction::End);

    // main_file(ptr, len): fd = file_open(ptr, len, read); copy to stdout.
    let mut main_file = Function::new([(2, ValType::I32)]);
    main_file.instruction(&Instruction::LocalGet(0));
    main_file.instruction(&Instruction::LocalGet(1));
    main_file.instruction(&Instruction::I32Const(0)); // read mode
    main_file.instruction(&Instruction::Call(0)); // file_open
    main_file.instruction(&Instruction::LocalSet(2));
    main_file.instruction(&Instruction::Block(BlockType::Empty));
    main_file.instruction(&Instruction::Loop(BlockType::Empty));
    main_file.instruction(&Instruction::LocalGet(2));
    main_file.instruction(&Instruction::Call(1)); // file_read
    main_file.instruction(&Instruction::LocalTee(3));
    main_file.instruction(&Instruction::I32Const(0));
    main_file.instruction(&Instruction::I32LtS);
    main_file.instruction(&Instruction::BrIf(1));
    main_file.instruction(&Instruction::LocalGet(3));
    main_file.instruction(&Instruction::Call(2)); // out_write
    main_file.instruction(&Instruction::Br(0));
    main_file.instruction(&Instruction::End);
    main_file.instruction(&Instruction::End);
    main_file.instruction(&Instruction::LocalGet(2));
    main_file.instruction(&Instruction::Call(3)); // file_close
    main_file.instruction(&Instruction::I32Const(0));
    main_file.instruction(&Instruction::End);

    let mut code = CodeSection::new();
    code.function(&alloc);
    code.function(&main_file);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&memories);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

/// Interactive module that writes "ok" into the conventional output file.
fn output_file_module() -> Vec<u8> {
    let path = b"output.txt";

    let mut types = TypeSection::new();
    types
        .ty()
        .function([ValType::I32, ValType::I32, ValType::I32], [ValType::I32]); // 0: file_open
    types.ty().function([ValType::I32, ValType::I32], []); // 1: file_write
    types.ty().function([ValType::I32], []); // 2: file_close
    types.ty().function([], [ValType::I32]); // 3: main

    let mut imports = ImportSection::new();
    imports.import("env", "file_open", EntityType::Function(0));
    imports.import("env", "file_write", EntityType::Function(1));
    imports.import("env", "file_close", EntityType::Function(2));

    let mut functions = FunctionSection::new();
    functions.function(3);

    let mut memories = MemorySection::new();
    memories.memory(test_memory());

    let mut exports = ExportSection::new();
    exports.export("main", ExportKind::Func, 3);
    exports.export("memory", ExportKind::Memory, 0);

    let mut data = DataSection::new();
    data.active(0, &ConstExpr::i32_const(0), path.iter().copied());

    let mut main = Function::new([(1, ValType::I32)]);
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::I32Const(path.len() as i32));
    main.instruction(&Instruction::I32Const(1)); // write mode
    main.instruction(&Instruction::Call(0)); // file_open
    main.instruction(&Instruction::LocalSet(0));
    for byte in b"ok" {
        main.instruction(&Instruction::LocalGet(0));
        main.instruction(&Instruction::I32Const(i32::from(*byte)));
        main.instruction(&Instruction::Call(1)); // file_write
    }
    main.instruction(&Instruction::LocalGet(0));
    main.instruction(&Instruction::Call(2)); // file_close
    main.instruction(&Instruction::I32Const(0));
    main.instruction(&Instruction::End);
    let mut code = CodeSection::new();
    code.function(&main);

    let mut module = Module::new();
    module.section(&types);
    module.section(&imports);
    module.section(&functions);
    module.section(&memories);
    module.section(&exports);
    module.section(&code);
    module.section(&data);
    module.finish()
}

/// Module exporting nothing callable.
fn entryless_module() -> Vec<u8> {
    Module::new().finish()
}

#[test]
fn hello_transcript_has_stdout_and_no_stderr_section() {
    let package = package_with(hello_module());
    let mut interpreter = Interpreter::load(&package).expect("load");
    assert_eq!(interpreter.convention(), CallingConvention::Interactive);

    match interpreter.run_program("anything") {
        SessionOutcome::Completed {
            transcript,
            exit_code,
        } => {
            assert_eq!(exit_code, 0);
            assert!(transcript.contains("hello"));
            assert!(!transcript.contains("--- STDERR ---"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("run failed: {diagnostic}"),
    }
}

#[test]
fn interactive_module_reads_the_program_through_virtual_stdin() {
    let package = package_with(echo_module());
    let mut interpreter = Interpreter::load(&package).expect("load");

    match interpreter.run_program("print 1 + 2;") {
        SessionOutcome::Completed { transcript, .. } => {
            assert!(transcript.contains("print 1 + 2;"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("run failed: {diagnostic}"),
    }
}

#[test]
fn sessions_do_not_leak_output_into_each_other() {
    let package = package_with(echo_module());
    let mut interpreter = Interpreter::load(&package).expect("load");

    let first = interpreter.run_program("first program");
    let second = interpreter.run_program("second program");

    match (first, second) {
        (
            SessionOutcome::Completed {
                transcript: first, ..
            },
            SessionOutcome::Completed {
                transcript: second, ..
            },
        ) => {
            assert!(first.contains("first program"));
            assert!(second.contains("second program"));
            assert!(!second.contains("first program"));
        }
        other => panic!("expected two completions, got {other:?}"),
    }
}

#[test]
fn unexpected_trap_resolves_to_failed_with_diagnostic() {
    let package = package_with(trapping_module());
    let mut interpreter = Interpreter::load(&package).expect("load");

    match interpreter.run_program("whatever") {
        SessionOutcome::Failed { diagnostic } => assert!(!diagnostic.is_empty()),
        SessionOutcome::Completed { transcript, .. } => {
            panic!("trap reported as completion: {transcript}")
        }
    }
}

#[test]
fn exit_trap_is_an_exit_code_not_an_error() {
    let package = package_with(exit_module(7));
    let mut interpreter = Interpreter::load(&package).expect("load");

    match interpreter.run_program("whatever") {
        SessionOutcome::Completed {
            transcript,
            exit_code,
        } => {
            assert_eq!(exit_code, 7);
            // Nothing was printed, so the transcript names the exit code.
            assert!(transcript.contains("exit code 7"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("exit treated as fault: {diagnostic}"),
    }
}

#[test]
fn stderr_appears_as_its_own_section() {
    let package = package_with(stderr_module());
    let mut interpreter = Interpreter::load(&package).expect("load");

    match interpreter.run_program("whatever") {
        SessionOutcome::Completed {
            transcript,
            exit_code,
        } => {
            assert_eq!(exit_code, 1);
            assert!(transcript.contains("--- STDERR ---"));
            assert!(transcript.contains("err"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("run failed: {diagnostic}"),
    }
}

#[test]
fn file_argument_module_receives_the_program_as_a_file() {
    let package = package_with(file_mode_module());
    let mut interpreter = Interpreter::load(&package).expect("load");
    assert_eq!(interpreter.convention(), CallingConvention::FileArgument);

    match interpreter.run_program("let x = 41 + 1") {
        SessionOutcome::Completed { transcript, .. } => {
            assert!(transcript.contains("let x = 41 + 1"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("run failed: {diagnostic}"),
    }
}

#[test]
fn output_file_is_appended_to_the_transcript() {
    let package = package_with(output_file_module());
    let mut interpreter = Interpreter::load(&package).expect("load");

    match interpreter.run_program("whatever") {
        SessionOutcome::Completed { transcript, .. } => {
            assert!(transcript.contains("--- OUTPUT FILE ---"));
            assert!(transcript.contains("ok"));
        }
        SessionOutcome::Failed { diagnostic } => panic!("run failed: {diagnostic}"),
    }
}

#[test]
fn virtual_files_are_removed_on_every_exit_path() {
    // Success path, file-argument mode (program.src created).
    let package = package_with(file_mode_module());
    let mut interpreter = Interpreter::load(&package).expect("load");
    interpreter.run_program("some program");
    assert_eq!(interpreter.virtual_file_count(), 0);

    // Success path, output file written.
    let package = package_with(output_file_module());
    let mut interpreter = Interpreter::load(&package).expect("load");
    interpreter.run_program("some program");
    assert_eq!(interpreter.virtual_file_count(), 0);

    // Failure path.
    let package = package_with(trapping_module());
    let mut interpreter = Interpreter::load(&package).expect("load");
    interpreter.run_program("some program");
    assert_eq!(interpreter.virtual_file_count(), 0);
}

#[test]
fn module_without_entry_point_is_rejected_at_load() {
    let package = package_with(entryless_module());
    match Interpreter::load(&package) {
        Err(SandboxError::MissingEntryPoint) => {}
        Err(other) => panic!("expected MissingEntryPoint, got {other:?}"),
        Ok(_) => panic!("entryless module loaded"),
    }
}

#[test]
fn garbage_bytes_are_rejected_at_load() {
    let package = package_with(vec![0xde, 0xad, 0xbe, 0xef]);
    match Interpreter::load(&package) {
        Err(SandboxError::ModuleLoad { reason }) => assert!(!reason.is_empty()),
        Err(other) => panic!("expected ModuleLoad, got {other:?}"),
        Ok(_) => panic!("garbage bytes loaded"),
    }
}
