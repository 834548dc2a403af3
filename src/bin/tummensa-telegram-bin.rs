use clap::{Parser, ValueEnum};
use teloxide::{dispatching::UpdateHandler, prelude::*};
use tokio_cron_scheduler::JobScheduler;

use tummensa_telegram_rs::bot_command_handlers::{about, fallback, start};
use tummensa_telegram_rs::constants::{DEVELOPER_CHAT_IDS, USER_DB};
use tummensa_telegram_rs::data_types::Command;
use tummensa_telegram_rs::db_operations::UserStore;
use tummensa_telegram_rs::menu_manager::MenuManager;
use tummensa_telegram_rs::notifications::send_notifications;
use tummensa_telegram_rs::shared_main::{callback_handler, logger_init, parse_broadcast_time};
use tummensa_telegram_rs::task_scheduler_funcs::load_broadcast_job;

/// Telegram bot for the daily meal plans of the Studentenwerk München
/// cafeterias.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 'daemon' answers chat interactively and broadcasts once a day,
    /// 'notifications' runs a single broadcast pass and exits
    #[arg(value_enum)]
    mode: RunMode,
    /// The telegram bot token to be used
    #[arg(short, long, env = "BOT_TOKEN")]
    token: String,
    /// Chat-IDs receiving error reports, comma separated
    #[arg(short, long, env = "DEVELOPER_IDS", value_delimiter = ',')]
    developer_ids: Vec<i64>,
    /// Local time of the daily broadcast{n}Format: HH:MM
    #[arg(short = 'n', long, env = "NOTIFICATION_TIME", default_value = "16:00")]
    notification_time: String,
    /// Path of the sqlite user database
    #[arg(long, env = "USER_DB_PATH", default_value = USER_DB)]
    db_path: String,
    /// Enable verbose logging{n}[SETS env: RUST_LOG=debug]
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RunMode {
    Daemon,
    Notifications,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    logger_init(module_path!());

    let (hour, minute) = match parse_broadcast_time(&args.notification_time) {
        Ok(time) => time,
        Err(e) => {
            log::error!("--notification-time: {}", e);
            std::process::exit(1);
        }
    };

    DEVELOPER_CHAT_IDS.get_or_init(|| args.developer_ids);

    let store = UserStore::new(&args.db_path);
    if let Err(e) = store.check_or_create_tables() {
        log::error!("Nutzer-Datenbank nicht nutzbar: {}", e);
        std::process::exit(1);
    }

    let menu_manager = MenuManager::new();
    let bot = Bot::new(args.token);

    match args.mode {
        RunMode::Notifications => {
            log::info!("Einmaliger Broadcast...");
            if let Err(e) = send_notifications(&bot, &menu_manager, &store).await {
                log::error!("Broadcast fehlgeschlagen: {}", e);
                std::process::exit(1);
            }
        }
        RunMode::Daemon => {
            let sched = JobScheduler::new().await.unwrap();
            load_broadcast_job(
                bot.clone(),
                &sched,
                menu_manager.clone(),
                store.clone(),
                hour,
                minute,
            )
            .await
            .unwrap();
            sched.start().await.unwrap();

            log::info!(
                "Broadcast täglich um {:02}:{:02} Uhr. Bot startet...",
                hour,
                minute
            );

            Dispatcher::builder(bot, schema())
                .dependencies(dptree::deps![menu_manager, store])
                .enable_ctrlc_handler()
                .build()
                .dispatch()
                .await;
        }
    }
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(dptree::case![Command::Start].endpoint(start))
        .branch(dptree::case![Command::About].endpoint(about));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(fallback));

    dptree::entry()
        .branch(message_handler)
        .branch(Update::filter_callback_query().endpoint(callback_handler))
}
