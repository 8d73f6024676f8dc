use std::process::ExitCode;

use log::debug;
use sim_lib::error::SimulatorResult;
use sim_lib::flags;
use sim_lib::run_wrapper;

fn main() -> ExitCode {
    env_logger::init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config_error() => {
            debug!("{}", e);
            eprintln!("Invalid configuration");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> SimulatorResult<()> {
    let config = flags::parse_args(std::env::args_os())?.into_config()?;
    config.validate()?;
    run_wrapper::run(&config)
}
