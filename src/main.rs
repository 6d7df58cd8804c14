fn main() {
    if let Err(err) = miaoge::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
