use mimalloc::MiMalloc;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use passage_index::IndexConfig;
use passage_index::document::passage::{ANSWERS, DEFAULT_SEARCH_FIELDS, PASSAGE_TEXT, QUERY, URL};
use passage_index::index::SearchHit;
use passage_index::search_engine::SearchEngine;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
struct Config {
    index_dir: String,
    passages_path: String,
    default_fields: Vec<String>,
    top_k: usize,
    index: IndexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index_dir: "index".to_string(),
            passages_path: "passages.json".to_string(),
            default_fields: DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
            top_k: 10,
            index: IndexConfig::default(),
        }
    }
}

fn load_config(path: &str) -> Config {
    if Path::new(path).exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    println!("✓ Loaded configuration from {}", path);
                    return config;
                }
                Err(e) => {
                    eprintln!("⚠ Error parsing {}: {}", path, e);
                    eprintln!("  Using default configuration");
                }
            },
            Err(e) => {
                eprintln!("⚠ Error reading {}: {}", path, e);
                eprintln!("  Using default configuration");
            }
        }
    } else {
        println!("ℹ {} not found, using default configuration", path);
    }

    Config::default()
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let document = &hit.document;
    if let Some(passage_text) = document.get(PASSAGE_TEXT) {
        println!("{}. [{:.4}] {}", rank, hit.score, passage_text);
        if let Some(url) = document.get(URL) {
            println!("   {}", url);
        }
    } else {
        println!("{}. [{:.4}] {}", rank, hit.score, document.get(QUERY).unwrap_or_default());
        let answers: Vec<&str> = document.get_all(ANSWERS).collect();
        if !answers.is_empty() {
            println!("   answers: {}", answers.join(" | "));
        }
    }
}

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("passage_index=info")))
        .init();

    let config_path = "config.json";
    let config = load_config(config_path);

    println!("\nCurrent Configuration:");
    println!("  Index Directory:   {}", config.index_dir);
    println!("  Passages Path:     {}", config.passages_path);
    println!("  Default Fields:    {}", config.default_fields.join(", "));
    println!("  Results Per Query: {}", config.top_k);

    if let Err(e) = config.index.validate() {
        eprintln!("Invalid index configuration: {}", e);
        return;
    }
    let mut search_engine =
        match SearchEngine::open_in_dir(&config.index_dir, config.index.clone(), config.default_fields.clone()) {
            Ok(search_engine) => search_engine,
            Err(e) => {
                eprintln!("Could not open index at {}: {}", config.index_dir, e);
                return;
            }
        };
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not start the line editor: {}", e);
            return;
        }
    };
    println!("\nWelcome to the passage index CLI! Type 'help' for commands or 'exit' to quit.\n");

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                let rest = rest.trim();

                match command {
                    "help" => {
                        println!("The valid commands are->");
                        println!("index [path]: Indexes a passage collection file (defaults to passages_path)");
                        println!("query [query string]: Queries your index for the particular query string entered");
                        println!("stats: Shows what the committed index contains");
                        println!("merge: Merges all segments into one");
                        println!("exit: Commits pending changes and quits");
                    }
                    "index" => {
                        let path = if rest.is_empty() { config.passages_path.as_str() } else { rest };
                        let start_time = Instant::now();
                        match search_engine.index_file(path) {
                            Ok(documents) => println!(
                                "Indexed {} documents from {} in {:.2} seconds",
                                documents,
                                path,
                                start_time.elapsed().as_secs_f32()
                            ),
                            Err(e) => eprintln!("Indexing failed: {}", e),
                        }
                    }
                    "query" => {
                        let start_time = Instant::now();
                        match search_engine.handle_query(rest, config.top_k) {
                            Ok(results) if results.total_hits == 0 => println!("No results"),
                            Ok(results) => {
                                println!("Number of results is {}", results.total_hits);
                                for (i, hit) in results.hits.iter().enumerate() {
                                    print_hit(i + 1, hit);
                                }
                                println!(
                                    "Showing {} of {} in {:?}",
                                    results.hits.len(),
                                    results.total_hits,
                                    start_time.elapsed()
                                );
                            }
                            Err(e) => eprintln!("Query failed: {}", e),
                        }
                    }
                    "stats" => match search_engine.get_index_metadata() {
                        Ok(metadata) => {
                            println!("The index generation is {}", metadata.generation);
                            println!("The number of segments is {}", metadata.no_of_segments);
                            println!("The number of indexed documents is {}", metadata.no_of_docs);
                            println!("The number of deleted documents is {}", metadata.no_of_deleted_docs);
                            println!("The number of indexed fields is {}", metadata.no_of_fields);
                            println!("The size of the index is {} bytes", metadata.size_of_index);
                        }
                        Err(e) => eprintln!("Could not read index stats: {}", e),
                    },
                    "merge" => match search_engine.merge() {
                        Ok(Some(segment_id)) => println!("The index has been merged into segment {}", segment_id),
                        Ok(None) => println!("The index is empty, nothing to merge"),
                        Err(e) => eprintln!("Merge failed: {}", e),
                    },
                    "quit" | "exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {
                        println!("Invalid command. Type help if you want to see the valid commands");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Err(e) = search_engine.close() {
        eprintln!("Could not commit pending changes: {}", e);
    }
}
