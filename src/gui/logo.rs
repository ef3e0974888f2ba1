use eframe::egui::{self, IconData};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 可选的 logo 文件，放在可执行文件旁边
pub const LOGO_FILE: &str = "logo.png";

/// 横幅高度
const BANNER_HEIGHT: f32 = 64.0;

pub fn logo_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(LOGO_FILE))
}

/// 读取 PNG；文件不存在或无法解码时返回 None
pub fn load_logo(path: &Path) -> Option<IconData> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("No logo at {}: {}", path.display(), e);
            return None;
        }
    };

    match eframe::icon_data::from_png_bytes(&bytes) {
        Ok(icon) => Some(icon),
        Err(e) => {
            warn!("Cannot decode logo {}: {}", path.display(), e);
            None
        }
    }
}

/// 按高度 64 等比缩放
pub fn banner_size(icon: &IconData) -> egui::Vec2 {
    if icon.height == 0 {
        return egui::Vec2::ZERO;
    }
    let width = icon.width as f32 * BANNER_HEIGHT / icon.height as f32;
    egui::vec2(width, BANNER_HEIGHT)
}

pub fn to_texture(ctx: &egui::Context, icon: &IconData) -> egui::TextureHandle {
    let image = egui::ColorImage::from_rgba_unmultiplied(
        [icon.width as usize, icon.height as usize],
        &icon.rgba,
    );
    ctx.load_texture("logo", image, egui::TextureOptions::LINEAR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 2x1 RGBA：一个蓝色像素，一个白色像素
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0xf4,
        0x22, 0x7f, 0x8a, 0x00, 0x00, 0x00, 0x0e, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x60,
        0xa8, 0xb8, 0xfe, 0x1f, 0x04, 0x00, 0x17, 0x4c, 0x06, 0x4b, 0x7d, 0x1e, 0x18, 0xb1, 0x00,
        0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_missing_logo_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_logo(&dir.path().join(LOGO_FILE)).is_none());
    }

    #[test]
    fn test_undecodable_logo_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOGO_FILE);
        fs::write(&path, b"not a png").unwrap();
        assert!(load_logo(&path).is_none());
    }

    #[test]
    fn test_png_logo_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LOGO_FILE);
        fs::write(&path, TINY_PNG).unwrap();

        let icon = load_logo(&path).unwrap();
        assert_eq!((icon.width, icon.height), (2, 1));
        assert_eq!(&icon.rgba[..4], &[0, 120, 215, 255]);
        assert_eq!(banner_size(&icon), egui::vec2(128.0, 64.0));
    }

    #[test]
    fn test_logo_sits_next_to_executable() {
        let path = logo_path().unwrap();
        assert!(path.ends_with(LOGO_FILE));
    }
}
