use clap::Parser;

/// This is an HTTP service returning the winners of primary elections.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file containing the primary results, keyed by
    /// state, county, party and candidate. Defaults to primary_results.json
    /// in the working directory.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (address:port) The socket address to listen on. Defaults to
    /// 127.0.0.1:8000.
    #[clap(short, long, value_parser)]
    pub listen: Option<String>,

    /// If passed as an argument, the results file is read once at startup and
    /// kept in memory instead of being reread on every request.
    #[clap(long, takes_value = false)]
    pub cache: bool,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
