use chrono::Timelike;
use teloxide::Bot;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::db_operations::UserStore;
use crate::menu_manager::MenuManager;
use crate::notifications::send_notifications;

/// Registers the daily broadcast at the given local time. The scheduler
/// expects UTC, so the local time is converted first.
pub async fn load_broadcast_job(
    bot: Bot,
    sched: &JobScheduler,
    menu_manager: MenuManager,
    store: UserStore,
    hour: u32,
    minute: u32,
) -> anyhow::Result<()> {
    let local_time = chrono::Local::now()
        .with_hour(hour)
        .unwrap()
        .with_minute(minute)
        .unwrap()
        .with_second(0)
        .unwrap();
    let utc_time = local_time.naive_utc();

    let job = Job::new_async(
        format!("0 {} {} * * *", utc_time.minute(), utc_time.hour()).as_str(),
        move |_uuid, mut _l| {
            let bot = bot.clone();
            let menu_manager = menu_manager.clone();
            let store = store.clone();

            Box::pin(async move {
                log::info!(target: "tummensa_telegram_rs::TaskSched", "Broadcast startet");
                if let Err(e) = send_notifications(&bot, &menu_manager, &store).await {
                    log::error!(target: "tummensa_telegram_rs::TaskSched", "Broadcast fehlgeschlagen: {}", e);
                }
            })
        },
    )?;

    sched.add(job).await?;
    Ok(())
}
