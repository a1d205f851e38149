use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    pagekit::example_apps::run_fetch_json(std::env::args().skip(1))
}
