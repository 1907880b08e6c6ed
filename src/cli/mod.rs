use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Bind to 0.0.0.0 instead of 127.0.0.1, exposing the server on all network interfaces
        #[arg(long)]
        public: bool,
    },

    /// List the models the relay can target
    Models,

    /// Send one message and print the reply
    Chat {
        message: String,

        #[arg(short, long)]
        model: Option<String>,

        /// low, medium or high (reasoning models only)
        #[arg(short, long)]
        reasoning_effort: Option<String>,

        /// Instruction-level message placed before the conversation
        #[arg(long)]
        developer: Option<String>,

        /// Path to an image to attach
        #[arg(short, long)]
        image: Option<String>,

        /// Print fragments as they arrive
        #[arg(short, long)]
        stream: bool,
    },
}
