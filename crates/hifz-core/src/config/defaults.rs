use crate::config::LogLevel;

pub(crate) fn default_loop_queue() -> bool {
    false
}

pub(crate) fn default_word_pauses_transport() -> bool {
    true
}

pub(crate) fn default_preload_next() -> bool {
    true
}

pub(crate) fn default_tick_interval_ms() -> u64 {
    50
}

pub(crate) fn default_perceptual_lead_secs() -> f64 {
    crate::timeline::DEFAULT_PERCEPTUAL_LEAD_SECS
}

pub(crate) fn default_page_size() -> usize {
    crate::timeline::DEFAULT_PAGE_SIZE
}

pub(crate) fn default_page_follow() -> bool {
    true
}

pub(crate) fn default_volume() -> f32 {
    1.0
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}
