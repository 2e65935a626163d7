use std::sync::Arc;

use chrono::Local;
use rand::seq::SliceRandom;
use regex::Regex;
use teloxide::prelude::*;
use tracing::warn;

use komek_core::{
    content::OpeningDate,
    domain::{ChatId, Grade, LessonKey},
    errors::Error,
    messaging::types::{InlineButton, InlineKeyboard},
    reports::ReportKind,
    texts::{self, escape_html},
    Result,
};

use crate::callback_data::CallbackData;
use crate::router::AppState;

use super::{ensure_admin, flows, log_handler_error, send, send_html};

const TELEGRAM_SAFE_LIMIT: usize = 3500;

const USAGE_SETTINGS: &str = "Использование: /lessons <номер класса>";
const USAGE_EDIT_CHAPTER_NAME: &str =
    "❌ Формат команды: /edit_chapter_name <номер класса> <номер главы> <новое название>";
const USAGE_EDIT_LESSON_NAME: &str =
    "❌ Формат команды: /edit_lesson_name <номер класса> <ключ урока> <новое название>";
const USAGE_EDIT_LESSON_URL: &str =
    "❌ Формат команды: /edit_lesson_url <номер класса> <ключ урока> <ссылка на видео>";
const USAGE_EDIT_CHAPTER_DATE: &str =
    "❌ Формат команды: /edit_chapter_date <номер класса> <номер главы> <дата в формате день/месяц>";
const USAGE_ADD_LESSON: &str = "❌ Формат команды: /add_lesson <номер класса> <номер главы> <название урока> <ссылка на видео>\n‼️Используйте \"_\" вместо пробела‼️";
const USAGE_ADD_SUB: &str = "Использование: /add_sub <user_id> <телефон>";
const USAGE_EXTEND_SUB: &str = "Использование: /extend_sub <user_id>";
const USAGE_REMOVE_SUB: &str = "Использование: /remove_sub <user_id>";
const USAGE_ADMIN_ADD: &str = "Использование: /admin_add <user_id> [ник]";
const USAGE_ADMIN_REMOVE: &str = "Использование: /admin_remove <user_id | ник>";

const REPORT_PROMPT: &str = "Какой из отчетов о подписках необходимо сгенерировать?";

pub(crate) async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;
    let user_id = user.id.0 as i64;
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "start" => {
            send(&state, chat_id, texts::HELLO).await;
            flows::send_grade_menu(&state, chat_id).await;
        }
        "get_id" => send(&state, chat_id, &texts::your_id(chat_id)).await,
        "subscribe" => flows::offer_subscription(&state, chat_id).await,

        "lessons" | "settings" => {
            if ensure_admin(&state, chat_id, user_id).await {
                show_settings(&state, chat_id, &args).await;
            }
        }
        "edit_chapter_name" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(
                    &state,
                    chat_id,
                    "edit_chapter_name",
                    edit_chapter_name(&state, &args),
                )
                .await;
            }
        }
        "edit_lesson_name" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(
                    &state,
                    chat_id,
                    "edit_lesson_name",
                    edit_lesson_name(&state, &args),
                )
                .await;
            }
        }
        "edit_lesson_url" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(
                    &state,
                    chat_id,
                    "edit_lesson_url",
                    edit_lesson_url(&state, &args),
                )
                .await;
            }
        }
        "edit_chapter_date" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(
                    &state,
                    chat_id,
                    "edit_chapter_date",
                    edit_chapter_date(&state, &args),
                )
                .await;
            }
        }
        "add_lesson" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(&state, chat_id, "add_lesson", add_lesson(&state, &args)).await;
            }
        }

        "add_sub" => {
            if ensure_admin(&state, chat_id, user_id).await {
                let result = add_subscriber(&state, &args).await;
                respond(&state, chat_id, "add_sub", result).await;
            }
        }
        "extend_sub" => {
            if ensure_admin(&state, chat_id, user_id).await {
                let result = extend_subscriber(&state, &args).await;
                respond(&state, chat_id, "extend_sub", result).await;
            }
        }
        "remove_sub" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(&state, chat_id, "remove_sub", remove_subscriber(&state, &args)).await;
            }
        }
        "admin_add" => {
            if ensure_admin(&state, chat_id, user_id).await {
                let result = admin_add(&state, &args).await;
                respond(&state, chat_id, "admin_add", result).await;
            }
        }
        "admin_remove" => {
            if ensure_admin(&state, chat_id, user_id).await {
                respond(&state, chat_id, "admin_remove", admin_remove(&state, &args)).await;
            }
        }
        "report" => {
            if ensure_admin(&state, chat_id, user_id).await {
                offer_reports(&state, chat_id).await;
            }
        }

        _ => {
            let reply = texts::UNKNOWN_REPLIES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(texts::UNKNOWN_REPLIES[0]);
            send(&state, chat_id, reply).await;
        }
    }

    Ok(())
}

/// Telegram may send `/cmd@botname arg1 ...`.
fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

async fn respond(state: &AppState, chat_id: i64, context: &'static str, result: Result<String>) {
    match result {
        Ok(reply) => send_html(state, chat_id, &reply).await,
        Err(e) => {
            log_handler_error(context, &e);
            send(state, chat_id, &error_reply(&e)).await;
        }
    }
}

/// User errors carry a ready user-facing message; anything else gets the
/// generic reply.
fn error_reply(e: &Error) -> String {
    match e {
        Error::Validation(msg) | Error::NotFound(msg) | Error::Conflict(msg) => msg.clone(),
        other => texts::generic_error(other),
    }
}

fn parse_grade(s: &str) -> Result<Grade> {
    Grade::parse(s).map_err(|_| Error::Validation(texts::BAD_GRADE.to_string()))
}

fn parse_chapter(s: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|_| Error::Validation(texts::CHAPTER_NOT_FOUND.to_string()))
}

fn parse_lesson_key(s: &str) -> Result<LessonKey> {
    LessonKey::parse(s).map_err(|_| Error::Validation(texts::LESSON_NOT_FOUND.to_string()))
}

fn parse_user_id(s: &str) -> Result<i64> {
    s.trim()
        .parse()
        .map_err(|_| Error::Validation(texts::BAD_USER_ID.to_string()))
}

fn chapter_not_found(e: Error) -> Error {
    match e {
        Error::NotFound(_) => Error::NotFound(texts::CHAPTER_NOT_FOUND.to_string()),
        other => other,
    }
}

fn lesson_not_found(e: Error) -> Error {
    match e {
        Error::NotFound(_) => Error::NotFound(texts::LESSON_NOT_FOUND.to_string()),
        other => other,
    }
}

// ============== Content edits ==============

fn edit_chapter_name(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.splitn(3, char::is_whitespace);
    let (Some(grade), Some(chapter), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Validation(USAGE_EDIT_CHAPTER_NAME.to_string()));
    };

    let grade = parse_grade(grade)?;
    let chapter = parse_chapter(chapter)?;
    let name = name.trim().replace('_', " ");

    state
        .content
        .rename_chapter(grade, chapter, &name)
        .map_err(chapter_not_found)?;

    Ok(format!(
        "✅ Раздел {chapter} в {grade} классе переименован в: <b>{}</b>",
        escape_html(&name)
    ))
}

fn edit_lesson_name(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.splitn(3, char::is_whitespace);
    let (Some(grade), Some(key), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Validation(USAGE_EDIT_LESSON_NAME.to_string()));
    };

    let grade = parse_grade(grade)?;
    let key = parse_lesson_key(key)?;
    let name = name.trim().replace('_', " ");

    state
        .content
        .rename_lesson(grade, key, &name)
        .map_err(lesson_not_found)?;

    Ok(format!(
        "✅ Урок {key} в {grade} классе переименован в: <b>{}</b>",
        escape_html(&name)
    ))
}

fn edit_lesson_url(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.splitn(3, char::is_whitespace);
    let (Some(grade), Some(key), Some(url)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Validation(USAGE_EDIT_LESSON_URL.to_string()));
    };

    let grade = parse_grade(grade)?;
    let key = parse_lesson_key(key)?;
    let url = url.trim();

    state
        .content
        .set_lesson_url(grade, key, url)
        .map_err(lesson_not_found)?;

    Ok(format!(
        "✅ URL урока {key} в {grade} классе обновлен: <a href=\"{0}\">{0}</a>",
        escape_html(url)
    ))
}

fn edit_chapter_date(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.splitn(3, char::is_whitespace);
    let (Some(grade), Some(chapter), Some(date)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Validation(USAGE_EDIT_CHAPTER_DATE.to_string()));
    };

    let grade = parse_grade(grade)?;
    let chapter = parse_chapter(chapter)?;
    let date = date.trim();

    let date_re = Regex::new(r"^\d{2}/\d{2}$").expect("valid regex");
    if !date_re.is_match(date) {
        return Err(Error::Validation(texts::BAD_DATE.to_string()));
    }
    let date =
        OpeningDate::parse(date).map_err(|_| Error::Validation(texts::BAD_DATE.to_string()))?;

    state
        .content
        .set_opening_date(grade, chapter, date)
        .map_err(chapter_not_found)?;

    Ok(format!(
        "✅ Дата открытия главы {chapter} в {grade} классе обновлена на: {date}"
    ))
}

fn add_lesson(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.splitn(4, char::is_whitespace);
    let (Some(grade), Some(chapter), Some(name), Some(url)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Validation(USAGE_ADD_LESSON.to_string()));
    };

    let grade = parse_grade(grade)?;
    let chapter = parse_chapter(chapter)?;
    let name = name.replace('_', " ");
    let url = url.trim();

    state
        .content
        .add_lesson(grade, chapter, &name, Some(url.to_string()))?;

    Ok(format!(
        "✅ Урок добавлен в {grade} класс, глава {chapter}: {} (<a href=\"{}\">Ссылка</a>)",
        escape_html(&name),
        escape_html(url)
    ))
}

// ============== Settings overview ==============

async fn show_settings(state: &AppState, chat_id: i64, args: &str) {
    if args.trim().is_empty() {
        send(state, chat_id, USAGE_SETTINGS).await;
        return;
    }

    let result = parse_grade(args.trim()).and_then(|grade| build_settings(state, grade));
    match result {
        Ok(html) => {
            for chunk in split_by_lines(&html, TELEGRAM_SAFE_LIMIT) {
                send_html(state, chat_id, &chunk).await;
            }
        }
        Err(e) => {
            log_handler_error("settings", &e);
            send(state, chat_id, &error_reply(&e)).await;
        }
    }
}

fn build_settings(state: &AppState, grade: Grade) -> Result<String> {
    let chapters = state.content.chapters(grade)?;
    let lessons = state.content.all_lessons(grade)?;

    let mut out = format!("📚 <b>Текущие разделы для {grade} класса:</b>\n");
    for chapter in &chapters {
        out.push_str(&format!(
            "{}: {}\n",
            chapter.number,
            escape_html(&chapter.name)
        ));
    }

    out.push_str(&format!(
        "\n📖 <b>Текущие уроки для {grade} класса:</b>\n"
    ));
    for (chapter, chapter_lessons) in &lessons {
        for lesson in chapter_lessons {
            let key = LessonKey {
                chapter: *chapter,
                lesson: lesson.number,
            };
            match &lesson.url {
                Some(url) => out.push_str(&format!(
                    "{key}: <i>{}</i> (<a href=\"{}\">Видео✅</a>)\n",
                    escape_html(&lesson.name),
                    escape_html(url)
                )),
                None => out.push_str(&format!(
                    "{key}: <i>{}</i> (<b>‼️Нет видео‼️</b>)\n",
                    escape_html(&lesson.name)
                )),
            }
        }
    }

    Ok(out)
}

/// Split a long message on line boundaries so each chunk stays under the
/// Telegram limit. A single oversized line is kept whole.
fn split_by_lines(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ============== Subscribers ==============

async fn add_subscriber(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.split_whitespace();
    let (Some(user_id), Some(phone)) = (parts.next(), parts.next()) else {
        return Err(Error::Validation(USAGE_ADD_SUB.to_string()));
    };
    let user_id = parse_user_id(user_id)?;

    let now = Local::now().naive_local();
    let expiry = state
        .ledger
        .add_or_renew(user_id, phone, state.cfg.subscription_days, now)?;

    if let Err(e) = state
        .messenger
        .send_text(ChatId(user_id), texts::SUBSCRIPTION_ACTIVATED)
        .await
    {
        warn!("activation notice to {user_id} failed: {e}");
    }

    Ok(format!(
        "Подписка для пользователя {user_id} добавлена до {}",
        expiry.format("%Y-%m-%d")
    ))
}

async fn extend_subscriber(state: &AppState, args: &str) -> Result<String> {
    let Some(user_id) = args.split_whitespace().next() else {
        return Err(Error::Validation(USAGE_EXTEND_SUB.to_string()));
    };
    let user_id = parse_user_id(user_id)?;

    let days = state.cfg.subscription_days;
    let expiry = state.ledger.extend(user_id, days).map_err(|e| match e {
        Error::NotFound(_) => Error::NotFound(format!(
            "Пользователь {user_id} не найден среди подписчиков."
        )),
        other => other,
    })?;

    if let Err(e) = state
        .messenger
        .send_text(ChatId(user_id), &texts::subscription_extended(days, expiry))
        .await
    {
        warn!("extension notice to {user_id} failed: {e}");
    }

    Ok(format!(
        "Подписка для пользователя {user_id} продлена до {}",
        expiry.format("%Y-%m-%d")
    ))
}

fn remove_subscriber(state: &AppState, args: &str) -> Result<String> {
    let Some(user_id) = args.split_whitespace().next() else {
        return Err(Error::Validation(USAGE_REMOVE_SUB.to_string()));
    };
    let user_id = parse_user_id(user_id)?;

    state.ledger.remove(user_id)?;
    Ok(format!("Подписка для пользователя {user_id} удалена"))
}

// ============== Admins ==============

async fn admin_add(state: &AppState, args: &str) -> Result<String> {
    let mut parts = args.split_whitespace();
    let Some(user_id) = parts.next() else {
        return Err(Error::Validation(USAGE_ADMIN_ADD.to_string()));
    };
    let user_id = parse_user_id(user_id)?;
    let nickname = parts.next().unwrap_or("Unknown");

    state
        .ledger
        .add_admin(nickname, user_id)
        .map_err(|e| match e {
            Error::Conflict(_) => {
                Error::Conflict(format!("Админ с ID {user_id} уже существует."))
            }
            other => other,
        })?;

    if let Err(e) = state
        .messenger
        .send_text(ChatId(user_id), texts::ADMIN_APPOINTED)
        .await
    {
        warn!("appointment notice to {user_id} failed: {e}");
    }

    Ok(format!("Админ с ID {user_id} добавлен!"))
}

fn admin_remove(state: &AppState, args: &str) -> Result<String> {
    let Some(identifier) = args.split_whitespace().next() else {
        return Err(Error::Validation(USAGE_ADMIN_REMOVE.to_string()));
    };

    state.ledger.remove_admin(identifier)?;
    Ok(format!("Админ {identifier} удален"))
}

// ============== Reports ==============

async fn offer_reports(state: &AppState, chat_id: i64) {
    let keyboard = InlineKeyboard::one_per_row(vec![
        InlineButton::new(
            "Подписки активные на данный момент",
            CallbackData::Report(ReportKind::Active).encode(),
        ),
        InlineButton::new(
            "Истекшие Подписки (за прошлый месяц)",
            CallbackData::Report(ReportKind::Expired).encode(),
        ),
        InlineButton::new(
            "Истекшие Подписки (больше месяца назад)",
            CallbackData::Report(ReportKind::OldExpired).encode(),
        ),
    ]);

    if let Err(e) = state
        .messenger
        .send_keyboard(ChatId(chat_id), REPORT_PROMPT, keyboard)
        .await
    {
        tracing::error!("failed to send report menu to {chat_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_strips_bot_mention() {
        assert_eq!(
            parse_command("/add_sub@komekbai_bot 7 +77010000001"),
            ("add_sub".to_string(), "7 +77010000001".to_string())
        );
        assert_eq!(parse_command("/start"), ("start".to_string(), String::new()));
    }

    #[test]
    fn split_by_lines_respects_limit() {
        let text = (0..100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let chunks = split_by_lines(&text, 80);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 80));
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn split_by_lines_keeps_short_text_whole() {
        let chunks = split_by_lines("a\nb", 100);
        assert_eq!(chunks, vec!["a\nb".to_string()]);
    }
}
