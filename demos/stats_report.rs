use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    pagekit::example_apps::run_stats_report(std::env::args().skip(1))
}
