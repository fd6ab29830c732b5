use lookout_common::StealthLevel;

use super::fingerprint::UserAgentProfile;

/// Chrome command-line arguments for a stealth level and fingerprint.
pub fn build_stealth_arguments(
    level: StealthLevel,
    profile: &UserAgentProfile,
    headless: bool,
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-plugins-discovery".to_string(),
        format!("--user-agent={}", profile.user_agent),
        format!("--window-size={},{}", profile.viewport.0, profile.viewport.1),
        format!("--lang={}", profile.languages.join(",")),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    if headless || level == StealthLevel::Maximum {
        args.push("--disable-gpu".to_string());
    }
    args
}

/// Scripts to run after each navigation for `level`, in order.
pub fn evasion_scripts(level: StealthLevel, profile: &UserAgentProfile) -> Vec<String> {
    let mut scripts = vec![StealthScripts::CORE.to_string()];
    match level {
        StealthLevel::Lightweight => {}
        StealthLevel::Balanced => scripts.push(StealthScripts::CANVAS.to_string()),
        StealthLevel::Maximum => {
            scripts.push(StealthScripts::CANVAS.to_string());
            scripts.push(StealthScripts::WEBGL.to_string());
            scripts.push(format!(
                "Object.defineProperty(navigator, 'platform', {{ get: () => '{}' }});",
                profile.platform
            ));
        }
    }
    scripts
}

/// JavaScript evasions that mask common automation signals.
pub struct StealthScripts;

impl StealthScripts {
    pub const CORE: &'static str = r#"
        Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
        Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
        Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
        if (!window.chrome) window.chrome = { runtime: {} };
    "#;

    pub const WEBGL: &'static str = r#"
        const getParameter = WebGLRenderingContext.prototype.getParameter;
        WebGLRenderingContext.prototype.getParameter = function(parameter) {
            if (parameter === 37445) return 'Intel Inc.';
            if (parameter === 37446) return 'Intel Iris OpenGL Engine';
            return getParameter.call(this, parameter);
        };
    "#;

    pub const CANVAS: &'static str = r#"
        const getContext = HTMLCanvasElement.prototype.getContext;
        HTMLCanvasElement.prototype.getContext = function(type, ...args) {
            const ctx = getContext.call(this, type, ...args);
            if (type === '2d' && ctx) {
                const origToDataURL = this.toDataURL;
                this.toDataURL = function(...a) {
                    const img = ctx.getImageData(0, 0, this.width, this.height);
                    for (let i = 0; i < img.data.length; i += 4) {
                        if (Math.random() < 0.001) img.data[i] += Math.random() < 0.5 ? -1 : 1;
                    }
                    ctx.putImageData(img, 0, 0);
                    return origToDataURL.call(this, ...a);
                };
            }
            return ctx;
        };
    "#;
}
