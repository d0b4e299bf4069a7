use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "greenroom")]
#[command(version, about = "Content lifecycle engine: drafts, publishing, audit history")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a greenroom store in the current directory
    Init,

    /// Create a new content object (group, person, soundtrack, work, settings)
    Create {
        /// Content type
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Acting user ID
        #[arg(long)]
        actor: String,

        /// Initial field values as path=value (value parsed as JSON, bare
        /// string fallback); can be repeated
        #[arg(long = "set", short = 's', value_name = "PATH=VALUE")]
        set: Vec<String>,

        /// Tags (fills "tags", or "genres" for works); can be repeated
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Media references for soundtracks; can be repeated
        #[arg(long = "media", short = 'm')]
        media: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply field updates to an object
    Update {
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Object ID
        id: String,

        #[arg(long)]
        actor: String,

        /// Field updates as path=value; can be repeated
        #[arg(long = "set", short = 's', value_name = "PATH=VALUE")]
        set: Vec<String>,

        /// Replacement tag list; can be repeated. Differences against the
        /// current list are logged as appends/removes.
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish a draft
    Publish {
        #[arg(value_name = "TYPE")]
        type_name: String,
        id: String,
        #[arg(long)]
        actor: String,
    },

    /// Turn a published object back into a draft
    Unpublish {
        #[arg(value_name = "TYPE")]
        type_name: String,
        id: String,
        #[arg(long)]
        actor: String,
    },

    /// Delete an object (and its posts)
    Delete {
        #[arg(value_name = "TYPE")]
        type_name: String,
        id: String,
        #[arg(long)]
        actor: String,
    },

    /// Join a group
    Join {
        /// Group ID
        id: String,
        #[arg(long)]
        actor: String,
    },

    /// Leave a group
    Leave {
        /// Group ID
        id: String,
        #[arg(long)]
        actor: String,
    },

    /// Get a single object by type and ID
    Get {
        #[arg(value_name = "TYPE")]
        type_name: String,
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List published objects of a type
    List {
        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the audit log with contribution scores
    Log {
        /// Only entries for this content type
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Only entries by this actor
        #[arg(long)]
        actor: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
