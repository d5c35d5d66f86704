fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match multihighlight_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[multihighlight-core] {error}");
            eprintln!("{}", multihighlight_core::runtime::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(error) = multihighlight_core::runtime::run_with_options(options) {
        eprintln!("[multihighlight-core] runtime failed: {error}");
        std::process::exit(1);
    }
}
