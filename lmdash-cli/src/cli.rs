use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lmdash_model::{DEFAULT_OLLAMA_URL, GenerationOptions};
use lmdash_rag::{DEFAULT_CORPUS_ROOT, DEFAULT_EMBEDDING_MODEL, DEFAULT_FILES_ROOT};

#[derive(Parser, Debug)]
#[command(name = "lmdash")]
#[command(version, about = "Compare, probe and manage local Ollama models", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL, global = true, help = "Ollama server address")]
    pub ollama_url: String,

    #[arg(long, env = "LMDASH_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true, help = "Embedding model for new corpora")]
    pub embedding_model: String,

    #[arg(long, env = "LMDASH_CORPUS_ROOT", default_value = DEFAULT_CORPUS_ROOT, global = true, help = "Directory holding corpora")]
    pub corpus_root: PathBuf,

    #[arg(long, env = "LMDASH_FILES_ROOT", default_value = DEFAULT_FILES_ROOT, global = true, help = "Directory holding source documents")]
    pub files_root: PathBuf,

    #[arg(long, default_value_t = 300, global = true, help = "Request timeout in seconds")]
    pub timeout_secs: u64,
}

/// Sampling flags shared by every generating command.
#[derive(Args, Debug, Clone)]
pub struct GenerationArgs {
    #[arg(long, default_value_t = 0.5)]
    pub temperature: f32,

    #[arg(long, default_value_t = 4000)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub presence_penalty: f32,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub frequency_penalty: f32,
}

impl From<&GenerationArgs> for GenerationOptions {
    fn from(args: &GenerationArgs) -> Self {
        Self {
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            presence_penalty: args.presence_penalty,
            frequency_penalty: args.frequency_penalty,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(subcommand, about = "Manage installed models")]
    Models(ModelCommands),

    #[command(about = "Send one prompt to several models and compare speed")]
    Compare {
        #[arg(short, long, required = true, value_delimiter = ',', help = "Models to compare (comma separated)")]
        models: Vec<String>,

        #[arg(short, long, help = "Prompt sent to every model")]
        prompt: String,

        #[arg(long, help = "Also probe JSON and function-calling support")]
        probe: bool,

        #[arg(long, help = "Print extracted code blocks instead of full responses")]
        code_only: bool,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    #[command(about = "Ask several vision models to describe an image")]
    Vision {
        #[arg(short, long, required = true, value_delimiter = ',')]
        models: Vec<String>,

        #[arg(short, long, help = "Image file to describe")]
        image: PathBuf,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    #[command(about = "Run prompts in sequence, carrying context between them")]
    Context {
        #[arg(short, long)]
        model: String,

        #[arg(
            short,
            long = "prompt",
            required = true,
            help = "Prompt to send; repeat for each turn"
        )]
        prompts: Vec<String>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    #[command(about = "Check JSON output and function calling for a model")]
    Probe {
        #[arg(short, long)]
        model: String,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    #[command(subcommand, about = "Manage retrieval corpora")]
    Corpus(CorpusCommands),
}

#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    #[command(about = "List installed models")]
    List,
    #[command(about = "Download a model")]
    Pull { name: String },
    #[command(about = "Show model details as JSON")]
    Show { name: String },
    #[command(about = "Delete a model")]
    Remove { name: String },
    #[command(about = "Pull every installed model again")]
    Update,
}

#[derive(Subcommand, Debug)]
pub enum CorpusCommands {
    #[command(about = "List corpora")]
    List,

    #[command(about = "List .txt and .json files available to build from")]
    Files,

    #[command(about = "Build a new corpus from library files")]
    Build {
        name: String,
        #[arg(required = true, help = "File names under the files root")]
        files: Vec<String>,
    },

    #[command(about = "Build a corpus, replacing any existing one with the same name")]
    Rebuild {
        name: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    #[command(about = "Retrieve the segments most similar to a query")]
    Query {
        name: String,
        query: String,
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },

    #[command(about = "Delete a corpus")]
    Delete { name: String },

    #[command(about = "Rename a corpus")]
    Rename { old_name: String, new_name: String },
}
