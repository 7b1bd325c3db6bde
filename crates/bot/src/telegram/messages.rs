//! User-facing texts and keyboards.
//!
//! Provides factory functions for:
//! - Registration prompts and the main menu
//! - Cart rendering with the editing cursor
//! - Delivery date and interval pickers
//! - Order confirmations, cancellations and staff notifications
//! - Inline search results

use chrono::NaiveDate;

use krash_order_core::delivery::{DATE_DISPLAY_FORMAT, DATE_LABEL_FORMAT};
use krash_order_core::{
    CartSnapshot, Catalog, ClientProfile, DeliveryInterval, DeliverySlot, Order, OrderId,
    OrderItem, OrderSnapshot, Product, UserId,
};

use super::callback::CallbackAction;
use super::types::{InlineKeyboardButton, InlineKeyboardMarkup, InlineQueryResultArticle};

pub const PRIVATE_CHAT_ONLY: &str = "Регистрация доступна только в приватном чате с ботом.";
pub const ALREADY_REGISTERED: &str = "Вы уже зарегистрированы. Меню товаров:";
pub const WELCOME: &str = "Добро пожаловать! Для начала работы необходимо зарегистрироваться. \
                           Пожалуйста, введите название вашей организации:";
pub const ORGANIZATION_EMPTY: &str =
    "Название организации не может быть пустым. Попробуйте снова:";
pub const ORGANIZATION_INVALID: &str =
    "Название организации должно содержать только буквы, пробелы или дефисы. Попробуйте снова:";
pub const ASK_CONTACT: &str = "Теперь введите ваше контактное лицо (ФИО):";
pub const CONTACT_EMPTY: &str = "ФИО не может быть пустым. Попробуйте снова:";
pub const CONTACT_INVALID: &str =
    "ФИО должно содержать только буквы, пробелы или дефисы. Попробуйте снова:";
pub const REGISTRATION_DONE: &str = "Регистрация завершена! Теперь вы можете заказывать продукты.";
pub const REGISTRATION_CANCELLED: &str = "Регистрация отменена. Начните заново с /start.";
pub const NOT_REGISTERED: &str =
    "Вы не зарегистрированы. Пожалуйста, используйте /start для регистрации.";
pub const FINISH_REGISTRATION: &str =
    "Пожалуйста, завершите регистрацию с помощью команды /start";

pub const QUANTITY_NOT_POSITIVE: &str =
    "Количество должно быть больше нуля. Пожалуйста, введите корректное количество:";
pub const QUANTITY_NOT_NUMBER: &str = "Пожалуйста, введите число. Попробуйте снова:";
pub const PRODUCT_NOT_FOUND: &str = "Такой продукт не найден. Попробуйте снова.";

pub const CART_EMPTY: &str = "Ваша корзина пуста!";
pub const CHOOSE_DATE: &str = "📅 Выберите дату доставки:\n\nДоступные даты на ближайшую неделю:";
pub const CHOOSE_TIME: &str = "🕒 Выберите интервал доставки:";
pub const DATE_NOT_SELECTED: &str = "Ошибка: дата не выбрана";
pub const UNKNOWN_INTERVAL: &str = "Такой интервал доставки недоступен. Выберите другой.";
pub const SLOT_PASSED: &str = "Это время доставки уже прошло. Выберите другой интервал или дату.";
pub const REGISTRATION_REQUIRED: &str = "Перед оформлением заказа необходимо зарегистрироваться!";
pub const SAVE_FAILED: &str =
    "Произошла ошибка при сохранении заказа. Пожалуйста, попробуйте позже.";

pub const CUTOFF_PASSED: &str = "⚠️ Отмена заказа возможна не позднее чем за 6 часов до доставки. \
                                 Сейчас отменить заказ уже нельзя.";
pub const NO_ORDER_TO_CANCEL: &str = "У вас нет активных заказов для отмены.";
pub const CANCEL_FAILED: &str = "Не удалось отменить заказ. Пожалуйста, свяжитесь с менеджером.";
pub const CANCEL_UNAVAILABLE: &str =
    "Сейчас не удалось отменить заказ. Пожалуйста, попробуйте еще раз позже.";
pub const NO_ACTIVE_ORDERS: &str = "У вас нет активных заказов.";

pub const CATALOG: &str = "Меню товаров:";
pub const ABOUT: &str = "ℹ️ О нас:\n\nМы доставляем свежие круассаны и выпечку каждое утро!\n\n\
                         Работаем с 6:00 до 13:00\n\
                         По вопросам сотрудничества: @Krash_order_Bot";
pub const MAIN_MENU: &str = "Выберите действие:";
pub const GENERIC_ERROR: &str = "Произошла ошибка. Пожалуйста, попробуйте позже.";

pub const ADMIN_ONLY: &str = "Эта команда доступна только администраторам.";
pub const STATS_BAD_FORMAT: &str =
    "Некорректный формат. Используйте DD.MM для дня или MM.YYYY для месяца.";
pub const STATS_FETCH_FAILED: &str = "Ошибка при получении данных. Попробуйте позже.";
pub const ADD_ADMIN_USAGE: &str =
    "Укажите ID пользователя для добавления в админы: /add_admin <user_id>";
pub const REMOVE_ADMIN_USAGE: &str =
    "Укажите ID пользователя для удаления из админов: /remove_admin <user_id>";
pub const ALREADY_ADMIN: &str = "Этот пользователь уже администратор.";
pub const NOT_ADMIN: &str = "Этот пользователь не является администратором.";
pub const CONFIGURED_ADMIN: &str =
    "Этот администратор задан в настройках бота и не может быть удалён.";
pub const INVALID_USER_ID: &str = "Некорректный ID пользователя.";

const CONFIRMATION_HEADER: &str = "✅ Ваш заказ оформлен!";
const MANAGER_FOLLOW_UP: &str = "Для уточнения деталей с вами свяжется менеджер.";

fn callback(text: &str, action: &CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn manager_button(text: &str, manager_url: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::url(text, manager_url)
}

/// Single "open menu" button that starts an inline product search.
#[must_use]
pub fn open_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::inline_search(
        "Открыть меню",
    )]])
}

#[must_use]
pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![callback("📋 Каталог", &CallbackAction::Catalog)],
        vec![callback("📦 Мои заказы", &CallbackAction::MyOrders)],
        vec![callback("ℹ️ О нас", &CallbackAction::About)],
    ])
}

#[must_use]
pub fn back_to_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback("⬅️ Назад", &CallbackAction::BackToMenu)]])
}

#[must_use]
pub fn client_info(profile: &ClientProfile) -> String {
    format!(
        "Ваши данные:\nОрганизация: {}\nКонтактное лицо: {}",
        profile.organization, profile.contact_person
    )
}

#[must_use]
pub fn product_selected(product: &Product) -> String {
    format!("Вы выбрали: {}. Введите количество:", product.title)
}

/// Render the cart; the line under the cursor is marked with an arrow.
#[must_use]
pub fn cart(snapshot: &CartSnapshot) -> String {
    if snapshot.is_empty() {
        return CART_EMPTY.to_string();
    }

    let lines: Vec<String> = snapshot
        .iter_marked()
        .map(|(current, line)| {
            format!(
                "{}{}\nОписание: {}\nКоличество: {}",
                if current { "➡️ " } else { "▪️ " },
                line.product.title,
                line.product.description,
                line.quantity
            )
        })
        .collect();

    format!("🛒 Ваша корзина:\n\n{}", lines.join("\n\n"))
}

/// Cart editing keyboard.
#[must_use]
pub fn cart_keyboard(manager_url: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            callback("◀️", &CallbackAction::PrevItem),
            callback("▶️", &CallbackAction::NextItem),
        ],
        vec![
            callback("➖", &CallbackAction::Decrease),
            callback("➕", &CallbackAction::Increase),
        ],
        vec![
            callback("❌ Удалить", &CallbackAction::RemoveItem),
            callback("🚚 Доставка", &CallbackAction::SelectDeliveryDate),
        ],
        vec![
            InlineKeyboardButton::inline_search("➕ Добавить еще"),
            manager_button("👨‍💼 Менеджер", manager_url),
        ],
    ])
}

/// Date picker: three dates per row, then a back button.
#[must_use]
pub fn dates_keyboard(dates: &[NaiveDate]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = dates
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|date| {
                    callback(
                        &date.format(DATE_LABEL_FORMAT).to_string(),
                        &CallbackAction::DeliveryDate(*date),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![callback("⬅️ Назад", &CallbackAction::BackToCart)]);
    InlineKeyboardMarkup::new(rows)
}

/// Interval picker: two intervals per row, then a back button.
#[must_use]
pub fn times_keyboard(intervals: &[DeliveryInterval]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = intervals
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|interval| {
                    callback(
                        interval.label(),
                        &CallbackAction::DeliveryTime(interval.label().to_string()),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![callback("⬅️ Назад", &CallbackAction::BackToDates)]);
    InlineKeyboardMarkup::new(rows)
}

fn order_lines(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|item| format!("▪️ {} - {} шт.", item.product.title, item.quantity))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Order lines plus delivery slot; shared by every order-related message.
#[must_use]
pub fn order_summary(snapshot: &OrderSnapshot, slot: &DeliverySlot) -> String {
    format!(
        "{}\n\n📅 Дата доставки: {}\n🕒 Время доставки: {}",
        order_lines(&snapshot.items),
        slot.date.format(DATE_DISPLAY_FORMAT),
        slot.interval
    )
}

/// Confirmation shown to the client after a successful commit.
#[must_use]
pub fn order_confirmation(summary: &str, can_cancel: bool) -> String {
    let mut text = format!("{CONFIRMATION_HEADER}\n\n{summary}");
    if !can_cancel {
        text.push_str("\n\n");
        text.push_str(CUTOFF_PASSED);
    }
    text.push_str("\n\n");
    text.push_str(MANAGER_FOLLOW_UP);
    text
}

#[must_use]
pub fn order_confirmation_keyboard(can_cancel: bool, manager_url: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::with_capacity(2);
    if can_cancel {
        rows.push(vec![callback(
            "❌ Отменить заказ",
            &CallbackAction::CancelLastOrder,
        )]);
    }
    rows.push(vec![manager_button(
        "👨‍💼 Связаться с менеджером",
        manager_url,
    )]);
    InlineKeyboardMarkup::new(rows)
}

#[must_use]
pub fn cancel_too_late(summary: &str) -> String {
    format!("{CUTOFF_PASSED}\n\n{summary}")
}

#[must_use]
pub fn manager_keyboard(manager_url: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![manager_button(
        "👨‍💼 Связаться с менеджером",
        manager_url,
    )]])
}

#[must_use]
pub fn order_cancelled(summary: &str) -> String {
    format!("❌ Заказ отменен\n\n{summary}")
}

/// Staff notification for a new order.
#[must_use]
pub fn admin_new_order(order_id: OrderId, snapshot: &OrderSnapshot, slot: &DeliverySlot) -> String {
    format!(
        "=== НОВЫЙ ЗАКАЗ ===\n\n\
         🏢 Организация: {}\n\
         👤 Контакт: {}\n\
         📱 Телеграм: @{}\n\
         📅 Доставка: {} {}\n\
         🆔 Номер заказа: {order_id}\n\n\
         Состав заказа:\n{}",
        snapshot.organization,
        snapshot.contact_person,
        snapshot.username.as_deref().unwrap_or("не указан"),
        slot.date.format(DATE_DISPLAY_FORMAT),
        slot.interval,
        order_lines(&snapshot.items)
    )
}

/// "Write to client" button, only when the client has a public username.
#[must_use]
pub fn admin_new_order_keyboard(username: Option<&str>) -> Option<InlineKeyboardMarkup> {
    username.map(|name| {
        InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
            "📨 Написать клиенту",
            format!("https://t.me/{name}"),
        )]])
    })
}

/// Staff notification for a cancelled order.
#[must_use]
pub fn admin_order_cancelled(order_id: OrderId, summary: &str) -> String {
    format!(
        "⚠️ ЗАКАЗ ОТМЕНЕН ⚠️\n\nЗаказ №{order_id} был отменен клиентом.\n\
         Оригинальное сообщение:\n\n{CONFIRMATION_HEADER}\n\n{summary}"
    )
}

/// The client's active order as shown under "my orders".
#[must_use]
pub fn active_order(order: &Order) -> String {
    format!(
        "📦 Ваш активный заказ:\n\n{}",
        order_summary(&order.order_data, &order.slot())
    )
}

#[must_use]
pub fn active_order_keyboard(order_id: OrderId, can_cancel: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::with_capacity(2);
    if can_cancel {
        rows.push(vec![callback(
            "❌ Отменить заказ",
            &CallbackAction::CancelOrder(order_id),
        )]);
    }
    rows.push(vec![callback("⬅️ Назад", &CallbackAction::BackToMenu)]);
    InlineKeyboardMarkup::new(rows)
}

/// Inline search results for `query`.
#[must_use]
pub fn inline_results(query: &str) -> Vec<InlineQueryResultArticle> {
    Catalog::search(query)
        .map(|product| {
            let mut article = InlineQueryResultArticle::new(
                product.id.to_string(),
                product.title,
                format!("{}\n{}", product.title, product.description),
            );
            article.description = product.description.to_string();
            article.thumbnail_url = Some(product.thumb_url.to_string());
            article
        })
        .collect()
}

#[must_use]
pub fn no_orders_for_period(period_label: &str) -> String {
    format!("Нет активных заказов за период {period_label}.")
}

#[must_use]
pub fn admin_added(user_id: UserId) -> String {
    format!("Пользователь {user_id} добавлен в админы.")
}

#[must_use]
pub fn admin_removed(user_id: UserId) -> String {
    format!("Пользователь {user_id} удалён из админов.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use krash_order_core::delivery::parse_date_key;
    use krash_order_core::{Cart, ProductId};

    fn product(id: i32) -> &'static Product {
        Catalog::get(ProductId::new(id)).expect("exists")
    }

    fn snapshot() -> OrderSnapshot {
        OrderSnapshot {
            organization: "ООО Рога".to_string(),
            contact_person: "Иванов Иван".to_string(),
            username: None,
            items: vec![
                OrderItem {
                    product: product(1).snapshot(),
                    quantity: 2,
                },
                OrderItem {
                    product: product(2).snapshot(),
                    quantity: 1,
                },
            ],
        }
    }

    fn slot() -> DeliverySlot {
        DeliverySlot::new(
            parse_date_key("2025-03-10").expect("valid"),
            DeliveryInterval::parse("6:00 - 8:00").expect("known"),
        )
    }

    #[test]
    fn test_cart_marks_cursor_line() {
        let mut cart = Cart::new();
        cart.add_or_increment(product(1), 2);
        cart.add_or_increment(product(4), 1);
        let text = super::cart(&cart.snapshot());
        assert!(text.starts_with("🛒 Ваша корзина:\n\n▪️ Классический круассан"));
        assert!(text.contains("➡️ Пан-о-шоколя\nОписание: 65 г\nКоличество: 1"));
    }

    #[test]
    fn test_empty_cart_text() {
        assert_eq!(super::cart(&Cart::new().snapshot()), CART_EMPTY);
    }

    #[test]
    fn test_dates_keyboard_layout() {
        let dates: Vec<_> = (10..17)
            .map(|d| parse_date_key(&format!("2025-03-{d}")).expect("valid"))
            .collect();
        let keyboard = dates_keyboard(&dates);
        let sizes: Vec<_> = keyboard.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1, 1]);
        let first = keyboard.buttons().next().expect("button");
        assert_eq!(first.text, "10.03");
        assert_eq!(
            first.callback_data.as_deref(),
            Some("delivery_date_2025-03-10")
        );
    }

    #[test]
    fn test_times_keyboard_layout() {
        let intervals: Vec<_> = DeliveryInterval::all().collect();
        let keyboard = times_keyboard(&intervals);
        let sizes: Vec<_> = keyboard.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 2, 2, 2, 1, 1]);
        let last = keyboard.buttons().last().expect("button");
        assert_eq!(last.callback_data.as_deref(), Some("back_to_dates"));
    }

    #[test]
    fn test_confirmation_with_and_without_cutoff() {
        let summary = order_summary(&snapshot(), &slot());
        assert!(summary.contains("▪️ Классический круассан - 2 шт.\n▪️ Миндальный круассан - 1 шт."));
        assert!(summary.contains("📅 Дата доставки: 10.03.2025"));

        let open = order_confirmation(&summary, true);
        assert!(open.starts_with(CONFIRMATION_HEADER));
        assert!(!open.contains(CUTOFF_PASSED));
        assert_eq!(order_confirmation_keyboard(true, "https://t.me/m").buttons().count(), 2);

        let closed = order_confirmation(&summary, false);
        assert!(closed.contains(CUTOFF_PASSED));
        let keyboard = order_confirmation_keyboard(false, "https://t.me/m");
        assert!(keyboard.buttons().all(|b| b.url.is_some()));
    }

    #[test]
    fn test_admin_notification_without_username() {
        let text = admin_new_order(OrderId::new(42), &snapshot(), &slot());
        assert!(text.contains("📱 Телеграм: @не указан"));
        assert!(text.contains("🆔 Номер заказа: 42"));
        assert!(admin_new_order_keyboard(None).is_none());
        let keyboard = admin_new_order_keyboard(Some("roga")).expect("keyboard");
        assert_eq!(
            keyboard.buttons().next().and_then(|b| b.url.as_deref()),
            Some("https://t.me/roga")
        );
    }

    #[test]
    fn test_inline_results_insert_title_and_description() {
        let results = inline_results("пан");
        assert_eq!(results.len(), 1);
        let article = results.first().expect("result");
        assert_eq!(article.id, "4");
        assert_eq!(article.input_message_content.message_text, "Пан-о-шоколя\n65 г");
        assert_eq!(
            Catalog::find_by_title(&article.input_message_content.message_text).map(|p| p.id),
            Some(ProductId::new(4))
        );
    }
}
