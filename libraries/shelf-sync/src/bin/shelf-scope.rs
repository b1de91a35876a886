#[cfg(not(feature = "scope"))]
fn main() {
    eprintln!("shelf-scope requires the 'scope' feature to be enabled");
    eprintln!("Please run with: cargo run --bin shelf-scope --features scope");
    std::process::exit(1);
}

#[cfg(feature = "scope")]
fn main() {
    use std::path::PathBuf;

    use futures::executor::block_on;
    use shelf_sync::{ItemCache, SqliteCache};

    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <path-to-cache-database>", args[0]);
        eprintln!("\nExample: {} ./library.sqlite", args[0]);
        std::process::exit(1);
    }

    let file_path = PathBuf::from(&args[1]);

    if !file_path.exists() {
        eprintln!("Error: File '{}' does not exist", file_path.display());
        std::process::exit(1);
    }

    let cache = match SqliteCache::open(&file_path) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error opening cache '{}': {}", file_path.display(), e);
            std::process::exit(1);
        }
    };

    println!("ShelfScope - Collection Cache Inspector");
    println!("=======================================");
    println!("File: {}", file_path.display());

    match block_on(cache.sync_token()) {
        Ok(Some(token)) => println!("Sync token: {token}"),
        Ok(None) => println!("Sync token: none (next load will be a full fetch)"),
        Err(e) => println!("Sync token: unreadable ({e})"),
    }
    println!();

    let items = match block_on(cache.get_all()) {
        Ok(items) => items,
        Err(e) => {
            eprintln!("Error reading items: {e}");
            std::process::exit(1);
        }
    };

    println!("Items: {}", items.len());
    println!("------");
    for item in &items {
        println!("  #{} {}", item.id, item.title().unwrap_or("(untitled)"));
        if let Some(status) = &item.read_status {
            println!("    Status: {status}");
        }
        if let Some(rating) = item.personal_rating {
            println!("    Rating: {rating}");
        }
        if let Some(progress) = &item.progress {
            println!("    Progress: {}", progress.percentage);
        }
        if !item.shelves.is_empty() {
            println!("    Shelves: {:?}", item.shelves);
        }
        if !item.files.is_empty() {
            println!("    Files: {}", item.files.len());
        }
    }
}
