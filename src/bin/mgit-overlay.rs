use failure::{format_err, Fallible};
use mgit_overlay::repo::GitRepository;
use mgit_overlay::{CommitRecord, Config, ObjectStore, Overlay};
use std::env;
use std::path::Path;
use std::process;

const USAGE: &str = "usage: mgit-overlay reconstruct <repo-path>
       mgit-overlay verify <repo-path>
       mgit-overlay show <rev>
       mgit-overlay log [max]";

const DEFAULT_LOG_COUNT: usize = 20;
const SHORT_HASH_LEN: usize = 12;

fn open(workdir: &Path) -> Fallible<Overlay> {
    let defaults = Config::from_env()?;
    let config = Config::load(workdir.join(&defaults.root_dir))?;
    Ok(Overlay::open(workdir, config))
}

/// The leading characters of a hash, for one-line output.  Records read from disk are not
/// trusted to be ASCII.
fn short_hash(hash: &str) -> String {
    hash.chars().take(SHORT_HASH_LEN).collect()
}

fn print_commit(record: &CommitRecord) {
    println!("commit {}", record.overlay_hash);
    println!("source {}", record.source_hash);
    if record.parent_hashes.len() > 1 {
        println!("merge {}", record.parent_hashes.join(" "));
    }
    println!(
        "Author: {} <{}> [{}]",
        record.author.name,
        record.author.email,
        record.identity_key()
    );
    println!("Date:   {}", record.author.when.to_rfc2822());
    println!();
    for line in record.message.lines() {
        println!("    {}", line);
    }
    println!();
}

fn run(args: &[String]) -> Fallible<()> {
    match args {
        [cmd, path] if cmd == "reconstruct" => {
            let repo = GitRepository::open(path)?;
            let report = open(Path::new(path))?.reconstruct(&repo)?;
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!(
                "reconstructed {} commits ({} already present), {} refs",
                report.written.len(),
                report.existing,
                report.refs.len()
            );
            Ok(())
        }
        [cmd, path] if cmd == "verify" => {
            let repo = GitRepository::open(path)?;
            let result = open(Path::new(path))?.verify_head(&repo)?;
            let result = result.into_result()?;
            println!("verified {} commits", result.checked);
            Ok(())
        }
        [cmd, rev] if cmd == "show" => {
            let overlay = open(&env::current_dir()?)?;
            let hash = overlay.resolve_revision(rev)?;
            print_commit(&overlay.storage().get(&hash)?);
            Ok(())
        }
        [cmd, rest @ ..] if cmd == "log" && rest.len() <= 1 => {
            let max = match rest.first() {
                Some(n) => n.parse::<usize>()?,
                None => DEFAULT_LOG_COUNT,
            };
            let overlay = open(&env::current_dir()?)?;
            let head = overlay.resolve_revision("HEAD")?;
            for record in overlay.log(&head, max)? {
                println!(
                    "{} {} [{}]",
                    short_hash(&record.overlay_hash),
                    record.summary(),
                    record.identity_key()
                );
            }
            Ok(())
        }
        _ => Err(format_err!("{}", USAGE)),
    }
}

fn main() -> Fallible<()> {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", USAGE);
        process::exit(2);
    }
    run(&args)
}
