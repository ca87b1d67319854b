//! Documented starter config written by `snare config init`.

/// Generate the default config template with a specific port.
pub fn default_config_template(port: u16) -> String {
    format!(
        r##"# snare configuration
# Environment variable substitution is supported: ${{ENV_VAR}} or ${{ENV_VAR:-fallback}}
# SNARE_* environment variables override the matching keys at startup.

[server]
bind = "127.0.0.1"                      # "0.0.0.0" to listen on all interfaces
port = {port}
http_request_logs = false               # debug-level access log

[browser]
# chrome_path = "/usr/bin/chromium"     # auto-detected when unset (also: CHROME env var)
headless = true
viewport_width = 360                    # portrait phone profile
viewport_height = 640
device_scale_factor = 1.0
mobile = true
has_touch = false
landscape = false
# user_agent = "Mozilla/5.0 (Linux; Android 13) ..."
chrome_args = []                        # appended to the built-in hardening switches
no_sandbox = false                      # set true when running as root in a container
launch_timeout_ms = 20000
navigation_timeout_ms = 30000           # budget to reach DOMContentLoaded
max_sessions = 4                        # concurrent live lookups (0 = unlimited)

[resolver]
embed_url = "https://rabbitstream.net/v2/embed-4/{{id}}?z=&_debug=true"
manifest_pattern = ".m3u8"
subtitle_pattern = ".vtt"
manifest_timeout_ms = 20000             # wait for the first playlist request

[cache]
enabled = true
backend = "sqlite"                      # sqlite | postgrest | memory
epoch = "2024-03-18T10:30:00.000Z"      # bump to invalidate every cached entry

[cache.sqlite]
# database_url = "sqlite:///var/lib/snare/snare.db"   # default: <data_dir>/snare.db

[cache.postgrest]
# url = "${{SUPABASE_URL}}"
# api_key = "${{SUPABASE_KEY}}"
table = "streams"
timeout_secs = 10
"##
    )
}
