mod commands;

use dashkit::accounts::{self, UserStore};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = match commands::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            if let Some(msg) = e.message() {
                println!("{}", msg);
            }
            print!("{}", commands::usage(e.usage_scope()));
            std::process::exit(1);
        }
    };

    // 도움말은 저장소를 열지 않음
    if command == commands::Command::Help {
        print!("{}", commands::usage(commands::UsageScope::All));
        return;
    }

    dashkit::init_tracing_with("warn");
    let path = accounts::users_db_path();
    let mut store = match UserStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = commands::run(command, &mut store, &mut stdout) {
        eprintln!("✗ Error: {:#}", e);
        std::process::exit(1);
    }
}
