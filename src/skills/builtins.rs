//! Built-in skills that need nothing outside the process.
//!
//! | Action | Reply |
//! |--------|-------|
//! | `time.now` | current local time, hours and minutes spelled out |
//! | `date.today` | current local date |
//! | `notes.add` | stores the words spoken after the matched phrase |
//! | `notes.list` | reads every stored note back |
//! | `notes.clear` | forgets every note |
//!
//! Replies are available in Russian, English and Uzbek; other language codes
//! get a language-neutral numeric reply or the Russian text.

use super::{SkillError, SkillRegistry};
use chrono::{Datelike, Local, NaiveDate, NaiveTime, Timelike};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Notes kept in memory for the life of the process.
///
/// Cloning shares the same list, so a rebuilt registry can keep the notes of
/// the one it replaces.
#[derive(Debug, Clone, Default)]
pub struct NoteBook {
    notes: Arc<Mutex<Vec<String>>>,
}

impl NoteBook {
    /// An empty notebook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a note. Blank notes are ignored; returns whether it was stored.
    pub fn add(&self, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() {
            return false;
        }
        match self.notes.lock() {
            Ok(mut notes) => {
                notes.push(note.to_owned());
                true
            }
            Err(_) => false,
        }
    }

    /// Every note, oldest first.
    pub fn list(&self) -> Vec<String> {
        self.notes.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Remove every note and return how many there were.
    pub fn clear(&self) -> usize {
        self.notes
            .lock()
            .map(|mut n| std::mem::take(&mut *n).len())
            .unwrap_or(0)
    }
}

/// Register every built-in skill, sharing `notes` across the note actions.
pub fn register(registry: &mut SkillRegistry, notes: &NoteBook) {
    registry.register_fn("time.now", |ctx| {
        Ok(spoken_time(Local::now().time(), &ctx.language))
    });
    registry.register_fn("date.today", |ctx| {
        Ok(spoken_date(Local::now().date_naive(), &ctx.language))
    });

    let book = notes.clone();
    registry.register_fn("notes.add", move |ctx| {
        let note = note_body(&ctx.text, &ctx.matched_phrase);
        if book.add(&note) {
            Ok(pick(
                &ctx.language,
                "Заметка добавлена.",
                "Note added.",
                "Eslatma qo'shildi.",
            )
            .to_owned())
        } else {
            Err(SkillError::failed(ctx.action.clone(), "nothing to note"))
        }
    });

    let book = notes.clone();
    registry.register_fn("notes.list", move |ctx| Ok(read_notes(&book, &ctx.language)));

    let book = notes.clone();
    registry.register_fn("notes.clear", move |ctx| {
        let reply = if book.clear() == 0 {
            pick(
                &ctx.language,
                "Нет заметок для удаления.",
                "There are no notes to delete.",
                "O'chirish uchun eslatma yo'q.",
            )
        } else {
            pick(
                &ctx.language,
                "Все заметки удалены.",
                "All notes deleted.",
                "Barcha eslatmalar o'chirildi.",
            )
        };
        Ok(reply.to_owned())
    });
}

/// A registry holding only the built-in skills.
pub fn registry(notes: &NoteBook) -> SkillRegistry {
    let mut registry = SkillRegistry::new();
    register(&mut registry, notes);
    registry
}

fn pick<'a>(language: &str, ru: &'a str, en: &'a str, uz: &'a str) -> &'a str {
    match language {
        "en" => en,
        "uz" => uz,
        _ => ru,
    }
}

fn read_notes(book: &NoteBook, language: &str) -> String {
    let notes = book.list();
    if notes.is_empty() {
        return pick(
            language,
            "Заметок пока нет.",
            "You have no notes yet.",
            "Hozircha eslatmalar yo'q.",
        )
        .to_owned();
    }
    let header = pick(language, "Ваши заметки:", "Your notes:", "Eslatmalaringiz:");
    format!("{header} {}.", notes.join("; "))
}

/// The words of `text` that are not part of the trigger phrase.
fn note_body(text: &str, matched_phrase: &str) -> String {
    let trigger: BTreeSet<String> = matched_phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();
    text.split_whitespace()
        .filter(|w| !trigger.contains(&w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `time` as a sentence in `language`.
pub fn spoken_time(time: NaiveTime, language: &str) -> String {
    let (hour, minute) = (time.hour(), time.minute());
    match language {
        "ru" => format!(
            "Сейчас {} {}, {} {}.",
            number_words_ru(hour, false),
            ru_plural(hour, "час", "часа", "часов"),
            number_words_ru(minute, true),
            ru_plural(minute, "минута", "минуты", "минут"),
        ),
        "en" => format!(
            "The time is {} {} and {} {}.",
            number_words_en(hour),
            if hour == 1 { "hour" } else { "hours" },
            number_words_en(minute),
            if minute == 1 { "minute" } else { "minutes" },
        ),
        "uz" => format!(
            "Hozir soat {} va {} daqiqa.",
            number_words_uz(hour),
            number_words_uz(minute)
        ),
        _ => format!("{hour:02}:{minute:02}"),
    }
}

/// `date` as a sentence in `language`.
pub fn spoken_date(date: NaiveDate, language: &str) -> String {
    let (day, month, year) = (date.day(), date.month0() as usize, date.year());
    match language {
        "ru" => format!("Сегодня {day} {} {year} года.", MONTHS_RU[month]),
        "en" => format!("Today is {} {day}, {year}.", MONTHS_EN[month]),
        "uz" => format!("Bugun {year} yil {day} {}.", MONTHS_UZ[month]),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

const MONTHS_RU: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];
const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const MONTHS_UZ: [&str; 12] = [
    "yanvar", "fevral", "mart", "aprel", "may", "iyun", "iyul", "avgust", "sentyabr", "oktyabr",
    "noyabr", "dekabr",
];

/// Russian noun form for `n`: 1 час, 2 часа, 5 часов, 11 часов, 21 час.
fn ru_plural<'a>(n: u32, one: &'a str, few: &'a str, many: &'a str) -> &'a str {
    match (n % 10, n % 100) {
        (_, 11..=14) => many,
        (1, _) => one,
        (2..=4, _) => few,
        _ => many,
    }
}

fn spell(n: u32, ones: &[&str; 10], teens: &[&str; 10], tens: &[&str; 6]) -> String {
    match n {
        0..=9 => ones[n as usize].to_owned(),
        10..=19 => teens[(n - 10) as usize].to_owned(),
        20..=59 => {
            let (ten, one) = (n / 10, n % 10);
            if one == 0 {
                tens[ten as usize].to_owned()
            } else {
                format!("{} {}", tens[ten as usize], ones[one as usize])
            }
        }
        _ => n.to_string(),
    }
}

/// Feminine forms serve minutes: "одна минута", "две минуты".
fn number_words_ru(n: u32, feminine: bool) -> String {
    const ONES: [&str; 10] = [
        "ноль", "один", "два", "три", "четыре", "пять", "шесть", "семь", "восемь", "девять",
    ];
    const ONES_FEMININE: [&str; 10] = [
        "ноль", "одна", "две", "три", "четыре", "пять", "шесть", "семь", "восемь", "девять",
    ];
    const TEENS: [&str; 10] = [
        "десять", "одиннадцать", "двенадцать", "тринадцать", "четырнадцать", "пятнадцать",
        "шестнадцать", "семнадцать", "восемнадцать", "девятнадцать",
    ];
    const TENS: [&str; 6] = ["", "", "двадцать", "тридцать", "сорок", "пятьдесят"];
    let ones = if feminine { &ONES_FEMININE } else { &ONES };
    spell(n, ones, &TEENS, &TENS)
}

fn number_words_en(n: u32) -> String {
    const ONES: [&str; 10] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];
    const TEENS: [&str; 10] = [
        "ten", "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen",
    ];
    const TENS: [&str; 6] = ["", "", "twenty", "thirty", "forty", "fifty"];
    spell(n, &ONES, &TEENS, &TENS)
}

fn number_words_uz(n: u32) -> String {
    const ONES: [&str; 10] = [
        "nol", "bir", "ikki", "uch", "to'rt", "besh", "olti", "yetti", "sakkiz", "to'qqiz",
    ];
    const TEENS: [&str; 10] = [
        "o'n", "o'n bir", "o'n ikki", "o'n uch", "o'n to'rt", "o'n besh", "o'n olti",
        "o'n yetti", "o'n sakkiz", "o'n to'qqiz",
    ];
    const TENS: [&str; 6] = ["", "", "yigirma", "o'ttiz", "qirq", "ellik"];
    spell(n, &ONES, &TEENS, &TENS)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::skills::SkillContext;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn russian_time_uses_plural_forms() {
        assert_eq!(spoken_time(time(21, 5), "ru"), "Сейчас двадцать один час, пять минут.");
        assert_eq!(spoken_time(time(3, 22), "ru"), "Сейчас три часа, двадцать две минуты.");
        assert_eq!(spoken_time(time(12, 11), "ru"), "Сейчас двенадцать часов, одиннадцать минут.");
        assert_eq!(spoken_time(time(0, 1), "ru"), "Сейчас ноль часов, одна минута.");
    }

    #[test]
    fn english_and_uzbek_time() {
        assert_eq!(
            spoken_time(time(1, 30), "en"),
            "The time is one hour and thirty minutes."
        );
        assert_eq!(spoken_time(time(14, 40), "uz"), "Hozir soat o'n to'rt va qirq daqiqa.");
        assert_eq!(spoken_time(time(7, 3), "de"), "07:03");
    }

    #[test]
    fn dates_per_language() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(spoken_date(date, "ru"), "Сегодня 19 октября 2026 года.");
        assert_eq!(spoken_date(date, "en"), "Today is October 19, 2026.");
        assert_eq!(spoken_date(date, "uz"), "Bugun 2026 yil 19 oktyabr.");
        assert_eq!(spoken_date(date, "fr"), "2026-10-19");
    }

    #[test]
    fn notes_round_trip_through_registry() {
        let notes = NoteBook::new();
        let registry = registry(&notes);

        let list = SkillContext::new("notes.list", "en");
        assert_eq!(registry.invoke(&list).unwrap(), "You have no notes yet.");

        let add = SkillContext::new("notes.add", "ru")
            .with_text("запиши заметку купить молоко")
            .with_match("запиши заметку", 100.0);
        assert_eq!(registry.invoke(&add).unwrap(), "Заметка добавлена.");
        assert_eq!(notes.list(), vec!["купить молоко".to_owned()]);

        assert_eq!(registry.invoke(&list).unwrap(), "Your notes: купить молоко.");

        let clear = SkillContext::new("notes.clear", "en");
        assert_eq!(registry.invoke(&clear).unwrap(), "All notes deleted.");
        assert!(notes.list().is_empty());
    }

    #[test]
    fn empty_note_is_a_failure() {
        let registry = registry(&NoteBook::new());
        let add = SkillContext::new("notes.add", "ru")
            .with_text("запиши заметку")
            .with_match("запиши заметку", 100.0);
        assert!(registry.invoke(&add).is_err());
    }

    #[test]
    fn notebook_is_shared_between_registries() {
        let notes = NoteBook::new();
        notes.add("первая");
        let rebuilt = registry(&notes);
        let reply = rebuilt.invoke(&SkillContext::new("notes.list", "ru")).unwrap();
        assert_eq!(reply, "Ваши заметки: первая.");
    }

    #[test]
    fn registers_every_builtin_action() {
        let registry = registry(&NoteBook::new());
        assert_eq!(
            registry.actions(),
            vec!["date.today", "notes.add", "notes.clear", "notes.list", "time.now"]
        );
    }
}
