//! Available subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// List configured servers
    Servers,

    /// Add a stdio server to the servers file
    Add {
        /// Server id
        id: String,
        /// Executable name or path (no arguments)
        command: String,
        /// Arguments passed to the executable (after `--`)
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        /// Environment variable for the server, as KEY=VALUE (repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Absolute working directory
        #[arg(long)]
        cwd: Option<String>,
        /// Extra directories searched for the executable and prepended to PATH
        #[arg(long = "path-extra")]
        path_extra: Option<String>,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
        /// Free-form category
        #[arg(long)]
        category: Option<String>,
        /// Add the server disabled
        #[arg(long)]
        disabled: bool,
        /// Replace an existing entry with the same id
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a server from the servers file
    Remove {
        /// Server id
        id: String,
    },

    /// Start enabled servers and print the tool catalog
    Tools {
        /// Only show tools declared by this server
        #[arg(short, long)]
        server: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Start enabled servers and call a tool
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Start each enabled server and report its health
    Check,
}
