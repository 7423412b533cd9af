pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_lock_window_secs() -> u64 {
    600
}

pub fn default_sweep_interval_secs() -> u64 {
    120
}

pub fn default_max_offered_items() -> usize {
    10
}
