//! メンバ本体の検査と脱出点の探索

use crate::TransformError;
use calltrace_ir::Body;

/// 正常リターン命令のオフセットを昇順で取得する
pub fn find_exit_points(body: &Body) -> Vec<usize> {
    body.code
        .iter()
        .enumerate()
        .filter(|(_, instr)| instr.is_return())
        .map(|(pc, _)| pc)
        .collect()
}

/// フックを挿入できる本体かどうかを検査する
///
/// 空の本体、末尾を越えて実行が続く本体、範囲外を指すハンドラ、
/// 既にフックを含む本体を拒否します。
pub fn validate(body: &Body, member: &str) -> Result<(), TransformError> {
    let len = body.len();
    let last = body.code.last().ok_or_else(|| TransformError::EmptyBody {
        member: member.to_string(),
    })?;

    if body.contains_hooks() {
        return Err(TransformError::AlreadyInstrumented {
            member: member.to_string(),
        });
    }

    if !last.is_terminal() {
        return Err(TransformError::FallsOffEnd {
            member: member.to_string(),
        });
    }

    for handler in &body.handlers {
        if handler.start >= handler.end || handler.end > len || handler.target >= len {
            return Err(TransformError::HandlerOutOfRange {
                member: member.to_string(),
                start: handler.start,
                end: handler.end,
                target: handler.target,
                len,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltrace_ir::{Handler, Hook, Instr, MethodRef};

    #[test]
    fn test_find_exit_points() {
        let body = Body::new(vec![
            Instr::Invoke(MethodRef::new("A", "f")),
            Instr::Return,
            Instr::Throw("E".into()),
            Instr::Return,
        ]);
        assert_eq!(find_exit_points(&body), vec![1, 3]);
    }

    #[test]
    fn test_validate_accepts_well_formed_body() {
        let mut body = Body::new(vec![Instr::Nop, Instr::Return, Instr::Rethrow]);
        body.handlers.push(Handler { start: 0, end: 1, target: 2, catch: None });
        assert_eq!(validate(&body, "f"), Ok(()));
    }

    #[test]
    fn test_validate_rejects_malformed_bodies() {
        assert_eq!(
            validate(&Body::default(), "f"),
            Err(TransformError::EmptyBody { member: "f".into() })
        );
        assert_eq!(
            validate(&Body::new(vec![Instr::Nop]), "f"),
            Err(TransformError::FallsOffEnd { member: "f".into() })
        );
        assert_eq!(
            validate(&Body::new(vec![Instr::Hook(Hook::Exit), Instr::Return]), "f"),
            Err(TransformError::AlreadyInstrumented { member: "f".into() })
        );

        let mut body = Body::new(vec![Instr::Nop, Instr::Return]);
        body.handlers.push(Handler { start: 0, end: 1, target: 2, catch: None });
        assert!(matches!(
            validate(&body, "f"),
            Err(TransformError::HandlerOutOfRange { target: 2, len: 2, .. })
        ));
    }
}
