use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    match sed_fit::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
