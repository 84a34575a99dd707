use clap::{Parser, Subcommand};
use relevancy::registry::{DEFAULT_MODEL, DEFAULT_SIZE};

#[derive(Parser)]
#[command(name = "relevancy")]
#[command(version, about = "Resolve and run pretrained transformer relevancy classifiers", long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// List the available transformer architectures and sizes
	Available,

	/// Fetch a classifier's artifacts into the local cache
	Pull {
		/// Model architecture (e.g., "bert" or "xlnet")
		#[arg(long, default_value = DEFAULT_MODEL)]
		model: String,

		/// Model size (e.g., "base" or "small")
		#[arg(long, default_value = DEFAULT_SIZE)]
		size: String,
	},

	/// Classify text for relevancy
	Predict {
		/// Text to classify (can be specified multiple times)
		#[arg(long)]
		text: Vec<String>,

		/// Model architecture (e.g., "bert" or "xlnet")
		#[arg(long, default_value = DEFAULT_MODEL)]
		model: String,

		/// Model size (e.g., "base" or "small")
		#[arg(long, default_value = DEFAULT_SIZE)]
		size: String,

		/// Only use artifacts already in the local cache
		#[arg(long)]
		no_validate: bool,
	},

	/// List classifiers fetched into the local cache
	Installed,

	/// Start the HTTP API server (classifiers loaded on-demand)
	Serve {
		/// Port to listen on
		#[arg(long, default_value = "8080")]
		port: u16,

		/// Host to bind to
		#[arg(long, default_value = "0.0.0.0")]
		host: String,
	},
}
