fn main() -> std::process::ExitCode {
    tierfetch::cli::run()
}
