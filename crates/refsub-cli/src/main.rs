use std::process::ExitCode;

fn main() -> ExitCode {
    refsub_cli::run()
}
