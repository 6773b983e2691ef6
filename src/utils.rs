//! 浏览器端初始化：panic 钩子与日志输出。

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// 把 `log` 输出接到浏览器控制台，重复调用无副作用。
pub fn init_logging(level: log::Level) {
    if console_log::init_with_level(level).is_err() {
        log::set_max_level(level.to_level_filter());
    }
}

/// 浏览器时钟（毫秒）。
pub fn now_ms() -> u64 {
    let now = web_sys::js_sys::Date::now();
    if now.is_finite() && now > 0.0 {
        now as u64
    } else {
        0
    }
}
