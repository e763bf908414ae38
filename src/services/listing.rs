use serde::Serialize;

use crate::models::Event;

/// Итог подсчета для пагинации на клиенте
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCount {
    pub count: i64,
    pub page_size: u32,
    pub pages: u32,
}

/// Число страниц: ceil(count / page_size), для пустой таблицы 0
pub fn page_count(count: i64, page_size: u32) -> PageCount {
    let size = page_size.max(1) as i64;
    let count = count.max(0);
    let pages = (count + size - 1) / size;
    PageCount {
        count,
        page_size,
        pages: pages.min(u32::MAX as i64) as u32,
    }
}

/// (limit, offset) для 1-based номера страницы; 0 трактуется как 1
pub fn page_bounds(page: u32, page_size: u32) -> (i64, i64) {
    let page = page.max(1) as i64;
    let size = page_size.max(1) as i64;
    (size, (page - 1) * size)
}

/// Фильтр по подстроке работает только по уже загруженной странице,
/// а не по всей таблице. Пустой запрос возвращает страницу как есть.
pub fn filter_page(events: Vec<Event>, query: Option<&str>) -> Vec<Event> {
    let needle = match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return events,
    };
    events.into_iter().filter(|e| e.matches(&needle)).collect()
}
