use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use car_listings::client::forms::{read_image_files, CreateForm, EditForm};
use car_listings::client::suggest::{SuggestionBox, DEBOUNCE_INTERVAL};
use car_listings::client::views::{
    delete_with_confirmation, render_card, render_detail, render_suggestions, Confirm,
    DeleteOutcome, Gallery,
};
use car_listings::utils::logger;
use car_listings::ListingsClient;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "carctl")]
#[command(about = "Browse and manage car listings from the terminal")]
struct Cli {
    /// Base URL of the listing service
    #[arg(long, env = "CAR_LISTINGS_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Bearer token for create, edit and delete
    #[arg(long, env = "CAR_LISTINGS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every car
    List,
    /// Show one car, optionally starting the gallery at a given image
    Show {
        id: String,
        #[arg(long, default_value_t = 1)]
        image: usize,
    },
    /// One-off title search
    Search { query: String },
    /// Interactive search: each line read from stdin is treated as the current input text
    Suggest,
    /// Create a car listing
    Create(CreateArgs),
    /// Edit an existing car listing
    Edit(EditArgs),
    /// Delete a car listing
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    price_range: String,
    /// Comma-separated tags, e.g. "electric, SUV"
    #[arg(long)]
    tags: Option<String>,
    /// Image files (at most 10)
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price_range: Option<String>,
    /// Replaces all tags; comma-separated
    #[arg(long)]
    tags: Option<String>,
    /// URL of a stored image to drop
    #[arg(long = "remove-image")]
    remove_images: Vec<String>,
    /// New image files to add
    #[arg(long = "add-image")]
    add_images: Vec<PathBuf>,
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    let mut client = ListingsClient::new(&cli.base_url)
        .with_context(|| format!("invalid --base-url {}", cli.base_url))?;
    if let Some(token) = &cli.token {
        client = client.with_token(token);
    }

    if let Err(e) = run(client, cli.command).await {
        tracing::debug!("carctl failed: {:?}", e);
        match e.downcast_ref::<car_listings::ListingError>() {
            Some(listing_error) => eprintln!("❌ {}", listing_error.user_friendly_message()),
            None => eprintln!("❌ {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(client: ListingsClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List => {
            let listings = client.list().await?;
            if listings.is_empty() {
                println!("No cars listed yet.");
            }
            for listing in &listings {
                println!("{}\n", render_card(listing));
            }
        }
        Command::Show { id, image } => {
            let listing = client.get(&id).await?;
            let mut gallery = Gallery::new(listing.images.clone());
            for _ in 1..image.max(1) {
                gallery.next();
            }
            println!("{}", render_detail(&listing, &gallery));
        }
        Command::Search { query } => {
            for summary in client.search(&query).await? {
                println!("{}  ({})", summary.title, summary.id);
            }
        }
        Command::Suggest => suggest(client).await?,
        Command::Create(args) => {
            let mut form = CreateForm::new(args.title, args.description, args.price_range);
            if let Some(tags) = &args.tags {
                form.set_tags_from_input(tags);
            }
            form.add_images(read_image_files(args.images.as_slice()).await?)?;

            let listing = client.create(&form).await?;
            println!("✅ Car added successfully!");
            println!("{}", render_card(&listing));
        }
        Command::Edit(args) => {
            let listing = client.get(&args.id).await?;
            let mut form = EditForm::from_listing(&listing);

            if let Some(title) = args.title {
                form.title = title;
            }
            if let Some(description) = args.description {
                form.description = description;
            }
            if let Some(price_range) = args.price_range {
                form.price_range = Some(price_range);
            }
            if let Some(tags) = &args.tags {
                form.set_tags_from_input(tags);
            }
            for url in &args.remove_images {
                if !form.remove_image(url) {
                    tracing::warn!("{} is not an image of this car", url);
                }
            }
            form.add_images(read_image_files(args.add_images.as_slice()).await?)?;

            let listing = client.save_edit(&form).await?;
            println!("✅ Car updated successfully!");
            println!("{}", render_card(&listing));
        }
        Command::Delete { id, yes } => {
            let outcome = if yes {
                delete_with_confirmation(&client, &id, &mut |_: &str| true).await?
            } else {
                delete_with_confirmation(&client, &id, &mut StdinConfirm).await?
            };

            match outcome {
                DeleteOutcome::Cancelled => println!("Delete cancelled."),
                DeleteOutcome::RedirectToIndex => {
                    println!("✅ Car deleted.");
                    for listing in client.list().await? {
                        println!("{}\n", render_card(&listing));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Feeds stdin lines to the suggestion box and prints each update.
async fn suggest(client: ListingsClient) -> anyhow::Result<()> {
    let suggestions = SuggestionBox::spawn(Arc::new(client));
    let mut updates = suggestions.subscribe();

    let (lines_tx, mut lines) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if lines_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!(
        "Type to search (suggestions after {}ms of quiet). Ctrl+D to quit.",
        DEBOUNCE_INTERVAL.as_millis()
    );
    let mut last_line: Option<String> = None;
    let mut printed_revision = 0;
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    suggestions.input(line.clone());
                    last_line = Some(line);
                }
                None => break,
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if !state.loading || !state.suggestions.is_empty() {
                    println!("-- {:?}", state.query);
                    println!("{}", render_suggestions(&state));
                    printed_revision = state.revision;
                }
            }
        }
    }

    // stdin 關閉時, 最後一行的查詢可能還在防抖等待中
    if let Some(last) = last_line {
        let wait = DEBOUNCE_INTERVAL + Duration::from_secs(10);
        match tokio::time::timeout(wait, suggestions.wait_for_query(&last)).await {
            Ok(state) if state.revision != printed_revision => {
                println!("-- {:?}", state.query);
                println!("{}", render_suggestions(&state));
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("No suggestions for {:?} within {:?}", last, wait),
        }
    }
    Ok(())
}
