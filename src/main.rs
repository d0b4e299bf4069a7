use clap::Parser;
use greenroom::cli::{
    handle_create, handle_delete, handle_get, handle_init, handle_join, handle_leave, handle_list,
    handle_log, handle_publish, handle_unpublish, handle_update, Cli, Commands,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Create {
            type_name,
            actor,
            set,
            tags,
            media,
            json,
        } => handle_create(type_name, actor, set, tags, media, json),
        Commands::Update {
            type_name,
            id,
            actor,
            set,
            tags,
            json,
        } => handle_update(type_name, id, actor, set, tags, json),
        Commands::Publish {
            type_name,
            id,
            actor,
        } => handle_publish(type_name, id, actor),
        Commands::Unpublish {
            type_name,
            id,
            actor,
        } => handle_unpublish(type_name, id, actor),
        Commands::Delete {
            type_name,
            id,
            actor,
        } => handle_delete(type_name, id, actor),
        Commands::Join { id, actor } => handle_join(id, actor),
        Commands::Leave { id, actor } => handle_leave(id, actor),
        Commands::Get {
            type_name,
            id,
            json,
        } => handle_get(type_name, id, json),
        Commands::List { type_name, json } => handle_list(type_name, json),
        Commands::Log {
            type_name,
            actor,
            json,
        } => handle_log(type_name, actor, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
