//! 布局几何能力
//!
//! 引擎自身不做排版，视口与元素几何由宿主环境（浏览器端）通过
//! `Layout` 提供。优先级评分的所有几何读取都经过这一层。

use markup5ever_rcdom::Handle;

/// 矩形区域，像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// 水平中心
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// 垂直中心
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// 两矩形是否相交
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// 宿主布局能力
///
/// 每次评分最多读取一次元素包围盒；实现方不应在内部做整页回流。
/// 几何随滚动变化，结果不可跨调用缓存。
pub trait Layout {
    /// 当前视口矩形
    fn viewport(&self) -> Rect;

    /// 元素的包围盒；尚未排版或脱离文档时返回 None
    fn bounding_rect(&self, element: &Handle) -> Option<Rect>;

    /// 元素是否参与显示（display:none / visibility:hidden 为 false）
    fn is_displayed(&self, element: &Handle) -> bool;
}

/// 无布局信息的退化实现
///
/// 用于无头处理场景：所有元素视为可见，但不提供几何，
/// 评分时只有文本与语义项生效。
#[derive(Debug)]
pub struct HeadlessLayout {
    viewport: Rect,
}

impl HeadlessLayout {
    pub fn new() -> Self {
        Self {
            viewport: Rect::new(0.0, 0.0, 1280.0, 720.0),
        }
    }
}

impl Layout for HeadlessLayout {
    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn bounding_rect(&self, _element: &Handle) -> Option<Rect> {
        None
    }

    fn is_displayed(&self, _element: &Handle) -> bool {
        true
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for HeadlessLayout {
    fn default() -> Self {
        Self::new()
    }
}
