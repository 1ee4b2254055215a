//! Smoke binary for `wordloop_core`.
//!
//! Usage: `wordloop_cli [db_path] [log_dir]`. Opens a store (in-memory
//! without `db_path`) and prints core and schema versions. With `log_dir`,
//! core events are written to rolling log files there.

use std::process::ExitCode;

fn main() -> ExitCode {
    let code = run();
    wordloop_core::flush_logging();
    code
}

fn run() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let path = args.next();
    let log_dir = args.next();

    if let Some(log_dir) = log_dir.as_deref() {
        if let Err(err) = wordloop_core::init_logging(wordloop_core::default_log_level(), log_dir)
        {
            eprintln!("wordloop_core logging init failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    let opened = match path.as_deref() {
        Some(path) => wordloop_core::open_db(path),
        None => wordloop_core::open_db_in_memory(),
    };

    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("wordloop_core open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("wordloop_core ping={}", wordloop_core::ping());
    println!("wordloop_core version={}", wordloop_core::core_version());
    if let Some((level, dir)) = wordloop_core::logging_status() {
        println!("wordloop_core logging level={} dir={}", level, dir.display());
    }
    match wordloop_core::schema_version(&conn) {
        Ok(version) => {
            println!(
                "wordloop_core schema={} latest={}",
                version,
                wordloop_core::latest_version()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("wordloop_core schema read failed: {err}");
            ExitCode::FAILURE
        }
    }
}
