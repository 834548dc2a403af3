use std::{collections::BTreeMap, sync::OnceLock};

use static_init::dynamic;

/// All known cafeterias, id -> display name. The ids are assigned by the
/// Studentenwerk and appear verbatim in plan URLs and callback payloads.
#[dynamic]
pub static MENSEN: BTreeMap<u32, &'static str> = BTreeMap::from([
    (421, "Mensa Arcisstr."),
    (411, "Mensa Leopoldstr."),
    (422, "Mensa Garching"),
    (412, "Mensa Martinsried"),
    (423, "Mensa Weihenstephan"),
    (432, "Mensa Pasing"),
    (450, "StuBistro Arcisstr."),
    (418, "StuBistro Goethestr."),
    (455, "StuBistro Akademiestr."),
    (415, "StuBistro Martinsried"),
    (416, "StuBistro Schellingstr."),
    (424, "StuBistro Oettingenstr."),
    (512, "StuCafé Adalbertstr."),
    (526, "StuCafé Akademie"),
    (527, "StuCafé Bolzmannstr."),
    (524, "StuCafé Garching"),
    (532, "StuCafé Karlstr."),
]);

/// Keyboard layout: one page per facility kind, rows of cafeteria ids.
pub const NAV_PAGES: [&[&[u32]]; 3] = [
    &[&[421, 411], &[422, 412], &[423, 432]],
    &[&[450, 418], &[455, 415], &[416, 424]],
    &[&[512, 526], &[527, 524], &[532]],
];
pub const NAV_PAGE_TITLES: [&str; 3] = ["Mensa", "StuBistro", "StuCafé"];

pub const MEAL_PLAN_URL_BASE: &str = "https://www.studentenwerk-muenchen.de/mensa/speiseplan";

pub const USER_DB: &str = "mensausers.sqlite";

/// Chats that receive error reports and unknown-command diagnostics.
pub static DEVELOPER_CHAT_IDS: OnceLock<Vec<i64>> = OnceLock::new();

pub const START_MSG: &str =
    "Bitte über das Menü eine Mensa wählen. Informationen über diesen Bot gibt's hier /about.";
pub const ABOUT_MSG: &str = "Dieser Bot wurde erstellt von @Alwinius, und wird weiterentwickelt von @markuspi.\n\
    Der Quellcode ist unter https://github.com/Alwinius/tummensabot verfügbar.\n\
    Weitere interessante Bots: \n - @tummoodlebot\n - @mydealz\\_bot\n - @tumroomsbot\n - @aachenmensabot";
pub const UNKNOWN_CMD_MSG: &str = "Kommando nicht erkannt";
pub const NO_SELECTION_MSG: &str = "Bitte zuerst über das Menü eine Mensa wählen.";
pub const FETCH_FAILED_MSG: &str = "Der Speiseplan konnte gerade nicht abgerufen werden.";
pub const NO_FILTER_MATCH_MSG: &str = "Keine Essen entsprechen dem gewählten Filter.";
