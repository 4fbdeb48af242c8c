//! The main function for the Athenaeum command line desk.

fn main() {
    // A .env file is optional for the CLI; flags and the process
    // environment take precedence either way.
    drop(dotenvy::dotenv());
    athenaeum::run();
}
