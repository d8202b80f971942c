use std::process;

fn main() {
    process::exit(vsm::cli::main());
}
