//! User-facing message strings (Russian, as the bot ships) and small HTML
//! helpers for Telegram's HTML parse mode.

use chrono::NaiveDateTime;

use crate::content::OpeningDate;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============== Student menus ==============

pub const HELLO: &str = "Привет 👋";
pub const GRADE_PROMPT: &str = "В каком ты классе?";
pub const CHAPTER_PROMPT: &str = "На какой ты главе? 📖";
pub const LESSON_PROMPT: &str = "Выберите урок 📚";
pub const NO_CHAPTERS: &str = "Нет доступных глав.";
pub const NO_LESSONS: &str = "Нет доступных уроков.";
pub const LOCKED_BUTTON: &str = "Заблокировано";

/// Trigger words that open the grade menu from free text.
pub const GREETING_TRIGGERS: &[&str] = &[
    "привет",
    "здравствуйте",
    "помоги",
    "салем",
    "сәлем",
    "сәлеметсіз",
    "домашнее",
    "задание",
    "дз",
    "работа",
    "домашку",
    "сделать",
    "домашка",
    "меню",
    "старт",
    "назад",
    "начало",
    "класс",
    "выбрать",
];

pub fn greeting(username: &str) -> String {
    format!("Привет {username}! 👋")
}

pub fn grade_intro(username: &str, grade: impl std::fmt::Display) -> String {
    format!(
        "Привет, {username}! Я КөмекБай - твой помощник в выполнении \
         домашних заданий за {grade} класс 😇"
    )
}

pub fn grade_button(grade: impl std::fmt::Display) -> String {
    format!("{grade} Класс")
}

pub fn your_id(chat_id: i64) -> String {
    format!("Ваш ID: {chat_id}")
}

// ============== Lessons ==============

pub fn lesson_video_html(name: &str, url: &str) -> String {
    format!(
        "(Подожди пока видео загрузится <a href=\"{}\">⌛</a>)\n<b>Урок - {}</b>",
        escape_html(url),
        escape_html(name)
    )
}

pub const LESSON_NOT_READY: &str = "К сожалению, этот урок еще не готов ☹";
pub const LESSON_BROKEN: &str =
    "К сожалению, возникли проблемы с этим уроком. Попробуйте еще раз позже ⚙";

pub fn broken_link_alert(
    lesson_name: &str,
    chapter: u32,
    grade: impl std::fmt::Display,
) -> String {
    format!("Проблема с ссылкой на видео в уроке {lesson_name}, глава {chapter}, класс {grade}")
}

// ============== Access gating ==============

const MONTHS_GENITIVE: [&str; 12] = [
    "Января",
    "Февраля",
    "Марта",
    "Апреля",
    "Мая",
    "Июня",
    "Июля",
    "Августа",
    "Сентября",
    "Октября",
    "Ноября",
    "Декабря",
];

/// Localized long form: `Этот раздел откроется 1 Сентября 🗓️`.
pub fn opening_date_message(date: OpeningDate) -> String {
    let month = MONTHS_GENITIVE
        .get(date.month as usize - 1)
        .copied()
        .unwrap_or("");
    format!("Этот раздел откроется {} {month} 🗓️", date.day)
}

pub const SUBSCRIBE_PROMPT: &str = "Оформите подписку для разблокировки этого раздела. \
     Отправьте боту слово \"Подписка\" для оплаты ✉️";

pub fn grade_locked(grade: impl std::fmt::Display) -> String {
    format!(
        "Оформите подписку для разблокировки {grade} класса. \
         Отправьте боту слово \"Подписка\" для оплаты ✉️"
    )
}

// ============== Subscription flow ==============

pub fn subscription_offer_html(price: u32) -> String {
    format!("Для оформления 30-дневной подписки, оплатите <b>{price}₸</b> через Kaspi.kz")
}

pub fn extension_offer_html(price: u32) -> String {
    format!(
        "Мы рады, что вам понравился КөмекБай! 😊 Для продления 30-дневной \
         подписки, оплатите <b>{price}₸</b> через Kaspi.kz"
    )
}

pub const SUBSCRIBE_BUTTON: &str = "Оформить Подписку 📲";
pub const EXTEND_BUTTON: &str = "Продлить Подписку 📲";
pub const SEND_PHONE: &str = "Отправьте свой номер телефона в чат 📞";
pub const BAD_PHONE: &str = "Введите корректный номер телефона.";
pub const PERIOD_PROMPT: &str = "На какой период вы бы хотели продлить подписку? 🕒";

pub fn period_button(months: u32) -> String {
    match months {
        1 => "1 месяц 🗓️".to_string(),
        3 => "3 месяца 📆".to_string(),
        6 => "6 месяцев 🕑".to_string(),
        n => format!("{n} мес."),
    }
}

pub fn payment_instructions_html(total: u32, payment_details: &str) -> String {
    format!(
        "Оплатите <b>{total}₸</b> по номеру:\n{}",
        escape_html(payment_details)
    )
}

pub const SUBSCRIPTION_PENDING: &str = "Бот сообщит вам, когда подписка станет активна 😊";
pub const EXTENSION_PENDING: &str = "Бот сообщит вам, как только подписка будет продлена 😊";

pub fn admin_subscription_request_html(chat_id: i64, phone: &str) -> String {
    format!(
        "Пользователь с ID: <b>{chat_id}</b>, телефон: {} желает купить подписку.",
        escape_html(phone)
    )
}

pub fn admin_extension_request_html(chat_id: i64, months: u32) -> String {
    format!(
        "Пользователь с ID: <b>{chat_id}</b>, желает продлить подписку на \
         {months} месяц(ев).\nИспользуйте команду '<i>/extend_sub user_id</i>' \
         для продления подписки"
    )
}

// ============== Lifecycle notifications ==============

pub const EXPIRY_REMINDER_3D: &str = "Дорогой пользователь КөмекБай! 📅 Срок вашей подписки истекает через 3 дня. ⏳ \
     Если вы желаете продлить подписку, напишите боту: \"Продлить подписку\" ✉️";

pub const EXPIRY_REMINDER_1D: &str = "Дорогой пользователь КөмекБай! 📅 Срок вашей подписки истекает завтра! ⏳ \
     Если вы желаете продлить подписку, напишите боту: \"Продлить подписку\" ✉️";

pub const SUBSCRIPTION_EXPIRED: &str = "Дорогой пользователь КөмекБай! 📅 К сожалению, срок вашей подписки истек. 😔 \
     Чтобы продолжить пользоваться нашими услугами, пожалуйста, продлите подписку";

pub const SUBSCRIPTION_ACTIVATED: &str =
    "Ваша Подписка была успешно активирована!\nПриятного пользования ботом КөмекБай!";

pub const ADMIN_APPOINTED: &str = "Вы были назначены админом ⚙";

pub fn subscription_extended(days: i64, until: NaiveDateTime) -> String {
    format!(
        "Ваша подписка продлена на {days} дней. Новая дата окончания: {}",
        until.format("%Y-%m-%d")
    )
}

// ============== Admin command replies ==============

pub const NOT_ALLOWED: &str = "У вас недостаточно прав.";
pub const BAD_GRADE: &str = "❌ Неверный номер класса. Пожалуйста, укажите класс от 1 до 4.";
pub const BAD_DATE: &str = "❌ Неверный формат даты. Пожалуйста, используйте формат день/месяц.";
pub const BAD_USER_ID: &str = "Пожалуйста, введите корректный ID пользователя.";
pub const CHAPTER_NOT_FOUND: &str = "❌ Раздел не найден.";
pub const LESSON_NOT_FOUND: &str = "❌ Урок не найден.";

// ============== Student-side fallbacks ==============

pub const BAD_CHAPTER_CHOICE: &str = "Некорректный выбор главы.";
pub const LESSON_MISSING: &str = "Урок не найден.";

pub fn generic_error(err: impl std::fmt::Display) -> String {
    format!("❌ Произошла ошибка: {err}")
}

// ============== Fallback ==============

pub const UNKNOWN_REPLIES: [&str; 10] = [
    "Извините, я вас не понял.",
    "Ой, не понял тебя.",
    "Прошу прощения, не совсем понял, что вы имеете в виду.",
    "Не совсем понял ваш запрос.",
    "К сожалению, я не смог понять ваш запрос.",
    "Введи \"Меню\" если хочешь открыть список классов",
    "Простите, не разобрал ваш вопрос.",
    "Прошу прощения, не понял, о чем вы говорите.",
    "Упс, не совсем понятно.",
    "Извините, не могу понять запрос.",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_date_in_long_form() {
        let date = OpeningDate { day: 1, month: 9 };
        assert_eq!(
            opening_date_message(date),
            "Этот раздел откроется 1 Сентября 🗓️"
        );
    }

    #[test]
    fn escape_html_covers_telegram_specials() {
        assert_eq!(
            escape_html(r#"<b>&"quote""#),
            "&lt;b&gt;&amp;&quot;quote&quot;"
        );
    }

    #[test]
    fn lesson_video_escapes_name_and_url() {
        let html = lesson_video_html("A<B", "https://v.co/1?a=1&b=2");
        assert!(html.contains("A&lt;B"));
        assert!(html.contains("a=1&amp;b=2"));
    }
}
