use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use teloxide::prelude::*;
use tracing::{error, warn};

use komek_core::{
    access::{self, Access, Viewer},
    content::VideoStatus,
    domain::{ChatId, Grade, LessonKey},
    messaging::types::{InlineButton, InlineKeyboard},
    reports::{self, ReportKind, ReportRow},
    texts, Result,
};

use crate::callback_data::CallbackData;
use crate::router::AppState;

use super::{ensure_admin, flows, log_handler_error, send, send_html, text::display_name};

pub(crate) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    // Always acknowledge the button press.
    let _ = state.messenger.answer_callback(&q.id, None).await;

    let data = q.data.clone().unwrap_or_default();
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat.id.0;
    let user_id = q.from.id.0 as i64;

    let Some(callback) = CallbackData::parse(&data) else {
        warn!("unrecognized callback data: {data:?}");
        return Ok(());
    };

    match callback {
        CallbackData::Grade(grade) => {
            grade_selected(&state, chat_id, user_id, &display_name(&q.from), grade).await;
        }
        // Locked buttons re-evaluate the policy, so a user who subscribed
        // meanwhile gets the content instead of a stale refusal.
        CallbackData::Chapter { grade, chapter }
        | CallbackData::LockedChapter { grade, chapter }
        | CallbackData::LockedByDate { grade, chapter } => {
            chapter_selected(&state, chat_id, user_id, grade, chapter).await;
        }
        CallbackData::Lesson {
            grade,
            chapter,
            lesson,
        } => {
            lesson_selected(&state, chat_id, grade, chapter, lesson).await;
        }
        CallbackData::Subscribe => {
            state.sessions.expect_phone(ChatId(chat_id)).await;
            send(&state, chat_id, texts::SEND_PHONE).await;
        }
        CallbackData::Extend => offer_periods(&state, chat_id).await,
        CallbackData::ExtendPeriod(months) => {
            flows::finalize_extension(&state, chat_id, months).await;
        }
        CallbackData::Report(kind) => send_report(&bot, &state, chat_id, user_id, kind).await,
    }

    Ok(())
}

fn viewer(state: &AppState, user_id: i64) -> Result<Viewer> {
    Ok(Viewer {
        is_admin: state.ledger.is_admin(user_id)?,
        is_subscriber: state.ledger.is_subscriber(user_id)?,
    })
}

async fn grade_selected(
    state: &AppState,
    chat_id: i64,
    user_id: i64,
    username: &str,
    grade: Grade,
) {
    // Grades 2-4 are gated as a whole; grade 1 is the free tier.
    if grade.number() >= 2 {
        match viewer(state, user_id) {
            Ok(v) if !v.is_admin && !v.is_subscriber => {
                send(state, chat_id, &texts::grade_locked(grade)).await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log_handler_error("grade menu", &e);
                send(state, chat_id, &texts::generic_error(&e)).await;
                return;
            }
        }
    }

    send(state, chat_id, &texts::grade_intro(username, grade)).await;

    match chapter_menu(state, user_id, grade) {
        Ok(None) => send(state, chat_id, texts::NO_CHAPTERS).await,
        Ok(Some(keyboard)) => {
            if let Err(e) = state
                .messenger
                .send_keyboard(ChatId(chat_id), texts::CHAPTER_PROMPT, keyboard)
                .await
            {
                error!("failed to send chapter menu to {chat_id}: {e}");
            }
        }
        Err(e) => {
            log_handler_error("chapter menu", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
        }
    }
}

/// One button per chapter; locked chapters render as a locked label whose
/// callback re-checks the policy.
fn chapter_menu(state: &AppState, user_id: i64, grade: Grade) -> Result<Option<InlineKeyboard>> {
    let chapters = state.content.chapters(grade)?;
    if chapters.is_empty() {
        return Ok(None);
    }

    let viewer = viewer(state, user_id)?;
    let today = Local::now().date_naive();

    let buttons = chapters
        .iter()
        .map(|ch| match access::chapter_access(ch, viewer, today) {
            Access::Open => InlineButton::new(
                ch.name.clone(),
                CallbackData::Chapter {
                    grade,
                    chapter: ch.number,
                }
                .encode(),
            ),
            Access::LockedBySubscription => InlineButton::new(
                texts::LOCKED_BUTTON,
                CallbackData::LockedChapter {
                    grade,
                    chapter: ch.number,
                }
                .encode(),
            ),
            Access::LockedByDate(_) => InlineButton::new(
                texts::LOCKED_BUTTON,
                CallbackData::LockedByDate {
                    grade,
                    chapter: ch.number,
                }
                .encode(),
            ),
        })
        .collect();

    Ok(Some(InlineKeyboard::one_per_row(buttons)))
}

async fn chapter_selected(
    state: &AppState,
    chat_id: i64,
    user_id: i64,
    grade: Grade,
    chapter: u32,
) {
    let record = match state.content.chapter(grade, chapter) {
        Ok(Some(ch)) => ch,
        Ok(None) => {
            send(state, chat_id, texts::BAD_CHAPTER_CHOICE).await;
            return;
        }
        Err(e) => {
            log_handler_error("chapter lookup", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
            return;
        }
    };

    let viewer = match viewer(state, user_id) {
        Ok(v) => v,
        Err(e) => {
            log_handler_error("chapter access", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
            return;
        }
    };

    match access::chapter_access(&record, viewer, Local::now().date_naive()) {
        Access::LockedByDate(date) => {
            send(state, chat_id, &texts::opening_date_message(date)).await;
        }
        Access::LockedBySubscription => send(state, chat_id, texts::SUBSCRIBE_PROMPT).await,
        Access::Open => send_lesson_menu(state, chat_id, grade, chapter).await,
    }
}

async fn send_lesson_menu(state: &AppState, chat_id: i64, grade: Grade, chapter: u32) {
    let lessons = match state.content.lessons(grade, chapter) {
        Ok(lessons) => lessons,
        Err(e) => {
            log_handler_error("lesson menu", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
            return;
        }
    };
    if lessons.is_empty() {
        send(state, chat_id, texts::NO_LESSONS).await;
        return;
    }

    let buttons = lessons
        .iter()
        .map(|lesson| {
            InlineButton::new(
                lesson.name.clone(),
                CallbackData::Lesson {
                    grade,
                    chapter,
                    lesson: lesson.number,
                }
                .encode(),
            )
        })
        .collect();

    if let Err(e) = state
        .messenger
        .send_keyboard(
            ChatId(chat_id),
            texts::LESSON_PROMPT,
            InlineKeyboard::one_per_row(buttons),
        )
        .await
    {
        error!("failed to send lesson menu to {chat_id}: {e}");
    }
}

async fn lesson_selected(state: &AppState, chat_id: i64, grade: Grade, chapter: u32, lesson: u32) {
    let key = LessonKey { chapter, lesson };
    let lesson = match state.content.find_lesson(grade, key) {
        Ok(Some(lesson)) => lesson,
        Ok(None) => {
            send(state, chat_id, texts::LESSON_MISSING).await;
            return;
        }
        Err(e) => {
            log_handler_error("lesson lookup", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
            return;
        }
    };

    match lesson.video() {
        VideoStatus::Ready(url) => {
            send_html(state, chat_id, &texts::lesson_video_html(&lesson.name, url)).await;
        }
        VideoStatus::NotReady => send(state, chat_id, texts::LESSON_NOT_READY).await,
        VideoStatus::Broken(_) => {
            send(state, chat_id, texts::LESSON_BROKEN).await;
            flows::notify_admins(
                state,
                &texts::broken_link_alert(&lesson.name, chapter, grade),
            )
            .await;
        }
    }
}

async fn offer_periods(state: &AppState, chat_id: i64) {
    let buttons = [1u32, 3, 6]
        .iter()
        .map(|&months| {
            InlineButton::new(
                texts::period_button(months),
                CallbackData::ExtendPeriod(months).encode(),
            )
        })
        .collect();

    if let Err(e) = state
        .messenger
        .send_keyboard(
            ChatId(chat_id),
            texts::PERIOD_PROMPT,
            InlineKeyboard::single_row(buttons),
        )
        .await
    {
        error!("failed to send period menu to {chat_id}: {e}");
    }
}

// ============== Reports ==============

async fn send_report(bot: &Bot, state: &AppState, chat_id: i64, user_id: i64, kind: ReportKind) {
    if !ensure_admin(state, chat_id, user_id).await {
        return;
    }

    let rows = match collect_rows(state, kind) {
        Ok(rows) => rows,
        Err(e) => {
            log_handler_error("report", &e);
            send(state, chat_id, &texts::generic_error(&e)).await;
            return;
        }
    };

    let mut report_rows = Vec::with_capacity(rows.len());
    for (row_user_id, phone, subscribed_at, expires_at) in rows {
        report_rows.push(ReportRow {
            user_id: row_user_id,
            username: resolve_username(bot, row_user_id).await,
            phone,
            subscribed_at,
            expires_at,
        });
    }

    let csv = reports::render_csv(&report_rows);
    send(state, chat_id, kind.caption()).await;
    if let Err(e) = state
        .messenger
        .send_document(ChatId(chat_id), kind.file_name(), csv.into_bytes(), None)
        .await
    {
        error!("failed to send report document: {e}");
        send(state, chat_id, &texts::generic_error(&e)).await;
    }
}

type LedgerRow = (i64, String, NaiveDateTime, NaiveDateTime);

fn collect_rows(state: &AppState, kind: ReportKind) -> Result<Vec<LedgerRow>> {
    Ok(match kind {
        ReportKind::Active => state
            .ledger
            .all_subscribers()?
            .into_iter()
            .map(|s| (s.user_id, s.phone, s.subscribed_at, s.expires_at))
            .collect(),
        ReportKind::Expired => state
            .ledger
            .all_expired()?
            .into_iter()
            .map(|s| (s.user_id, s.phone, s.subscribed_at, s.expires_at))
            .collect(),
        ReportKind::OldExpired => state
            .ledger
            .all_old_expired()?
            .into_iter()
            .map(|s| (s.user_id, s.phone, s.subscribed_at, s.expires_at))
            .collect(),
    })
}

async fn resolve_username(bot: &Bot, user_id: i64) -> Option<String> {
    bot.get_chat(teloxide::types::ChatId(user_id))
        .await
        .ok()
        .and_then(|chat| chat.username().map(str::to_string))
}
