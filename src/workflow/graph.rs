//! 工作流路由与状态转移
//!
//! Start →(route)→ Identify | FollowUp | End；Identify → FetchAggregate → End；FollowUp → End。
//! 无环，每轮只遍历一次。

use crate::workflow::types::{CalorieState, NodeName, Route, TurnIntent};

/// 按字段存在性选择入口节点（纯函数）
pub fn route(state: &CalorieState) -> Route {
    route_intent(TurnIntent::of(state))
}

pub fn route_intent(intent: TurnIntent) -> Route {
    match intent {
        TurnIntent::FollowUpQuestion { .. } => Route::FollowUp,
        TurnIntent::ImageUpload => Route::Identify,
        TurnIntent::Empty => Route::End,
    }
}

/// 节点执行后的下一个节点；None 表示到达 End
pub fn next(node: NodeName) -> Option<NodeName> {
    match node {
        NodeName::Identify => Some(NodeName::FetchAggregate),
        NodeName::FetchAggregate | NodeName::FollowUp => None,
    }
}

/// 路由对应的完整节点序列
pub fn path(route: Route) -> Vec<NodeName> {
    std::iter::successors(route.entry(), |node| next(*node)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(image: bool, query: bool, result: bool) -> CalorieState {
        CalorieState {
            image_bytes: image.then(|| vec![0xff, 0xd8, 0xff]),
            mime: image.then(|| "image/jpeg".to_string()),
            user_query: query.then(|| "how much protein?".to_string()),
            result: result.then(|| "- Total: 300 kcal".to_string()),
            ..CalorieState::default()
        }
    }

    #[test]
    fn test_route_precedence() {
        assert_eq!(route(&state(true, true, true)), Route::FollowUp);
        assert_eq!(route(&state(false, true, true)), Route::FollowUp);
        assert_eq!(route(&state(true, true, false)), Route::Identify);
        assert_eq!(route(&state(true, false, true)), Route::Identify);
        assert_eq!(route(&state(true, false, false)), Route::Identify);
        assert_eq!(route(&state(false, true, false)), Route::FollowUp);
        assert_eq!(route(&state(false, false, true)), Route::End);
        assert_eq!(route(&state(false, false, false)), Route::End);
    }

    #[test]
    fn test_route_ignores_non_routing_fields() {
        let mut s = state(false, false, true);
        s.food_items = Some("- apple (1, large)".into());
        s.user_result = Some("earlier answer".into());
        assert_eq!(route(&s), Route::End);
        assert_eq!(route(&s), route(&s.clone()));
    }

    #[test]
    fn test_image_without_mime_is_not_an_upload() {
        let mut s = state(true, false, false);
        s.mime = None;
        assert_eq!(route(&s), Route::End);
        s.mime = Some(String::new());
        assert_eq!(route(&s), Route::End);
    }

    #[test]
    fn test_paths() {
        assert_eq!(path(Route::Identify), vec![NodeName::Identify, NodeName::FetchAggregate]);
        assert_eq!(path(Route::FollowUp), vec![NodeName::FollowUp]);
        assert!(path(Route::End).is_empty());
    }
}
