fn main() -> std::process::ExitCode {
    interface_coordinator::run()
}
