//! # 布局与几何模块
//!
//! 纯计算，不涉及像素：
//! - `GridLayout`：九个位置各放哪张图
//! - `letterbox_fit`：保持宽高比缩放进格子，短边方向居中

use super::config::{CELL_COUNT, FILLER_COUNT};
use super::{CellPosition, GridError};

/// 格子内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellContent {
    User,
    /// 第 n 张填充图片。
    Filler(usize),
}

/// 单次合成的格子分配表。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    cells: [CellContent; CELL_COUNT],
}

impl GridLayout {
    /// 用户图片放在 `user_position`，其余位置按行优先依次放入填充图片。
    pub fn build(user_position: CellPosition, filler_count: usize) -> Result<Self, GridError> {
        if filler_count != FILLER_COUNT {
            return Err(GridError::InvalidConfig(format!(
                "需要 {} 张填充图片，实际 {} 张",
                FILLER_COUNT, filler_count
            )));
        }

        let mut cells = [CellContent::User; CELL_COUNT];
        let mut next_filler = 0;
        for position in CellPosition::all() {
            if position != user_position {
                cells[position.index()] = CellContent::Filler(next_filler);
                next_filler += 1;
            }
        }

        Ok(Self { cells })
    }

    pub fn content_at(&self, position: CellPosition) -> CellContent {
        self.cells[position.index()]
    }

    /// 按绘制顺序（0..8）遍历。
    pub fn iter(&self) -> impl Iterator<Item = (CellPosition, CellContent)> + '_ {
        CellPosition::all().map(|position| (position, self.cells[position.index()]))
    }
}

/// 浮点精度的放置结果（相对格子左上角）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 像素精度的放置结果（相对格子左上角）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 保持宽高比缩放进 `target_width × target_height` 的区域并居中。
///
/// 图片比区域“更宽”时以宽度为准、垂直居中；否则以高度为准、水平居中。
/// 结果至少有一边贴满区域，且永不越界。
pub fn letterbox_fit(
    image_width: u32,
    image_height: u32,
    target_width: u32,
    target_height: u32,
) -> Placement {
    let image_ratio = image_width as f64 / image_height as f64;
    let target_ratio = target_width as f64 / target_height as f64;
    let (tw, th) = (target_width as f64, target_height as f64);

    if image_ratio > target_ratio {
        let height = tw / image_ratio;
        Placement {
            x: 0.0,
            y: (th - height) / 2.0,
            width: tw,
            height,
        }
    } else {
        let width = th * image_ratio;
        Placement {
            x: (tw - width) / 2.0,
            y: 0.0,
            width,
            height: th,
        }
    }
}

impl Placement {
    /// 取整到像素：尺寸四舍五入（1 ~ 区域边长），剩余边距整除 2 居中。
    pub fn to_pixel_rect(&self, target_width: u32, target_height: u32) -> PixelRect {
        let width = (self.width.round() as u32).clamp(1, target_width.max(1));
        let height = (self.height.round() as u32).clamp(1, target_height.max(1));

        PixelRect {
            x: (target_width.saturating_sub(width)) / 2,
            y: (target_height.saturating_sub(height)) / 2,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn position(index: i32) -> CellPosition {
        CellPosition::try_from(index).expect("valid position")
    }

    #[test]
    fn center_user_gets_fillers_in_row_major_order() {
        let layout = GridLayout::build(position(4), 8).expect("layout");
        let expected = [
            CellContent::Filler(0),
            CellContent::Filler(1),
            CellContent::Filler(2),
            CellContent::Filler(3),
            CellContent::User,
            CellContent::Filler(4),
            CellContent::Filler(5),
            CellContent::Filler(6),
            CellContent::Filler(7),
        ];

        let actual: Vec<_> = layout.iter().map(|(_, content)| content).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn layout_requires_exactly_eight_fillers() {
        assert!(matches!(
            GridLayout::build(position(0), 7),
            Err(GridError::InvalidConfig(_))
        ));
        assert!(matches!(
            GridLayout::build(position(0), 9),
            Err(GridError::InvalidConfig(_))
        ));
    }

    #[test]
    fn square_image_fills_cell_exactly() {
        let placement = letterbox_fit(500, 500, 266, 266);
        assert_eq!(
            placement,
            Placement { x: 0.0, y: 0.0, width: 266.0, height: 266.0 }
        );
    }

    #[test]
    fn twice_as_wide_is_vertically_centered() {
        let placement = letterbox_fit(400, 200, 300, 300);
        assert_eq!(placement.width, 300.0);
        assert_eq!(placement.height, 150.0);
        assert_eq!(placement.x, 0.0);
        assert_eq!(placement.y, 75.0);
    }

    #[test]
    fn tall_image_is_horizontally_centered() {
        let placement = letterbox_fit(100, 400, 200, 200);
        assert_eq!(placement.height, 200.0);
        assert_eq!(placement.width, 50.0);
        assert_eq!(placement.x, 75.0);
        assert_eq!(placement.y, 0.0);
    }

    #[test]
    fn landscape_photo_in_default_cell() {
        let rect = letterbox_fit(1200, 800, 266, 266).to_pixel_rect(266, 266);
        assert_eq!(rect, PixelRect { x: 0, y: 44, width: 266, height: 177 });
    }

    #[test]
    fn small_images_are_scaled_up() {
        let rect = letterbox_fit(10, 5, 90, 90).to_pixel_rect(90, 90);
        assert_eq!((rect.width, rect.height), (90, 45));
    }

    proptest! {
        #[test]
        fn every_position_yields_one_user_and_each_filler_once(user in 0i32..9) {
            let layout = GridLayout::build(position(user), 8).expect("layout");

            let mut users = 0;
            let mut seen = [0usize; 8];
            for (pos, content) in layout.iter() {
                match content {
                    CellContent::User => {
                        users += 1;
                        prop_assert_eq!(pos.index(), user as usize);
                    }
                    CellContent::Filler(n) => seen[n] += 1,
                }
            }

            prop_assert_eq!(users, 1);
            prop_assert!(seen.iter().all(|&count| count == 1));
        }

        #[test]
        fn fillers_keep_sequence_order(user in 0i32..9) {
            let layout = GridLayout::build(position(user), 8).expect("layout");
            let fillers: Vec<usize> = layout
                .iter()
                .filter_map(|(_, content)| match content {
                    CellContent::Filler(n) => Some(n),
                    CellContent::User => None,
                })
                .collect();
            prop_assert_eq!(fillers, (0..8).collect::<Vec<_>>());
        }

        #[test]
        fn letterbox_never_exceeds_cell_and_touches_one_side(
            w in 1u32..4000,
            h in 1u32..4000,
            cell in 1u32..1000,
        ) {
            let p = letterbox_fit(w, h, cell, cell);
            let c = cell as f64;
            let eps = 1e-9 * c.max(1.0);

            prop_assert!(p.width <= c + eps && p.height <= c + eps);
            prop_assert!(p.x >= -eps && p.y >= -eps);
            prop_assert!((p.width - c).abs() < eps || (p.height - c).abs() < eps);
            prop_assert!((p.x * 2.0 + p.width - c).abs() < eps);
            prop_assert!((p.y * 2.0 + p.height - c).abs() < eps);

            let rect = p.to_pixel_rect(cell, cell);
            prop_assert!(rect.x + rect.width <= cell);
            prop_assert!(rect.y + rect.height <= cell);
            prop_assert!(rect.width == cell || rect.height == cell);
        }

        #[test]
        fn letterbox_preserves_aspect_ratio(w in 1u32..4000, h in 1u32..4000, cell in 1u32..1000) {
            let p = letterbox_fit(w, h, cell, cell);
            let expected = w as f64 / h as f64;
            prop_assert!((p.width / p.height - expected).abs() <= expected * 1e-9);
        }
    }
}
