use chrono::{DateTime, Local};
use std::sync::Mutex;

/// 进程内共享的 session_id 生成器
pub(crate) static SESSION_IDS: SessionIdGenerator = SessionIdGenerator::new();

/// 生成 `session_<YYYYmmdd_HHMMSS>` 形式的会话标识。
///
/// 同一秒内的后续请求追加 `_<n>` 计数后缀，保证进程内唯一。
pub struct SessionIdGenerator {
    /// (上一次的秒级前缀, 该前缀已使用次数)
    last: Mutex<Option<(String, u32)>>,
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdGenerator {
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub fn next(&self) -> String {
        self.next_at(Local::now())
    }

    pub fn next_at(&self, now: DateTime<Local>) -> String {
        let base = format!("session_{}", now.format("%Y%m%d_%H%M%S"));
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match last.as_mut() {
            Some((prev, count)) if *prev == base => {
                *count += 1;
                format!("{base}_{count}")
            }
            _ => {
                *last = Some((base.clone(), 0));
                base
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_second_gets_suffix() {
        let ids = SessionIdGenerator::new();
        let t = Local.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap();
        assert_eq!(ids.next_at(t), "session_20261019_101500");
        assert_eq!(ids.next_at(t), "session_20261019_101500_1");
        assert_eq!(ids.next_at(t), "session_20261019_101500_2");
    }

    #[test]
    fn test_new_second_resets_counter() {
        let ids = SessionIdGenerator::new();
        let t1 = Local.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap();
        let t2 = Local.with_ymd_and_hms(2026, 10, 19, 10, 15, 1).unwrap();
        ids.next_at(t1);
        ids.next_at(t1);
        assert_eq!(ids.next_at(t2), "session_20261019_101501");
    }
}
