use libertyvm::config::VmConfig;
use libertyvm::debug_server;
use libertyvm::game_world::NullWorld;
use libertyvm::interpreter::Interpreter;
use libertyvm::opcode_table::standard_table;
use libertyvm::scm_file::ScmFile;
use libertyvm::vm::Vm;
use log::{debug, info};
use std::env;
use std::path::Path;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("libertyvm - cooperative interpreter for compiled mission scripts");
        println!();
        println!("Usage: {} <script.scm> [--config libertyvm.toml]", args[0]);
        println!();
        println!("The inspection protocol is served on the configured TCP port");
        println!("(default 3001); open http://127.0.0.1:3001/ for the console.");
        return Ok(());
    }
    let script_path = &args[1];

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) => args
            .get(i + 1)
            .map(String::as_str)
            .ok_or("--config needs a path")?,
        None => "libertyvm.toml",
    };
    let config = VmConfig::load(Path::new(config_path))?;

    debug!("loading script: {script_path}");
    let data = match std::fs::read(script_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: cannot read script file '{script_path}': {e}");
            std::process::exit(1);
        }
    };

    let file = ScmFile::load(data)?;
    info!(
        "script loaded: {} missions, {} models, code at {:06x}",
        file.mission_offsets().len(),
        file.models().len(),
        file.code_section()
    );

    let mut vm = Vm::new(file);
    vm.start_thread(0, false);

    let table = standard_table();
    info!("opcode table ready: {} entries", table.len());

    let mut interpreter = Interpreter::new(vm, table, Box::new(NullWorld::default()), config.clone());
    let _server = debug_server::spawn(interpreter.debug_handle(), config.debug_port)?;

    let step = Duration::from_millis(config.tick_ms as u64);
    while interpreter.has_live_threads() {
        let started = Instant::now();
        if let Err(fault) = interpreter.tick(config.tick_ms as i32) {
            eprintln!("fatal script fault: {fault}");
            return Err(Box::new(std::io::Error::other(fault.to_string())));
        }
        if let Some(remaining) = step.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    info!("all script threads finished");
    Ok(())
}
