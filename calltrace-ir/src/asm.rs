//! クラスのテキスト形式（`.cls`）の読み書き
//!
//! ```text
//! class com/example/App
//! static method main
//!   .line 3
//!   invoke com/example/App.foo
//!   return
//! end
//! abstract method run
//! ```

use crate::{
    Body, ClassFile, Handler, Hook, Instr, LineTable, Member, MemberKind, MethodId, MethodRef,
    Modifiers, Result, CLASS_INIT_NAME, CONSTRUCTOR_NAME,
};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// テキスト形式の解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unknown directive '{text}'")]
    UnknownDirective { line: usize, text: String },

    #[error("line {line}: {message}")]
    Invalid { line: usize, message: String },

    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    #[error("member '{member}' is not terminated by 'end'")]
    UnterminatedMember { member: String },
}

/// 解析途中の `.catch` 指令
struct PendingCatch {
    line: usize,
    catch: Option<String>,
    from: String,
    to: String,
    using: String,
}

/// 解析途中のメンバ本体
struct PendingMember {
    member: Member,
    code: Vec<Instr>,
    labels: HashMap<String, usize>,
    catches: Vec<PendingCatch>,
    lines: LineTable,
}

impl PendingMember {
    fn new(member: Member) -> Self {
        Self {
            member,
            code: Vec::new(),
            labels: HashMap::new(),
            catches: Vec::new(),
            lines: LineTable::new(),
        }
    }

    /// ラベルを解決してメンバを完成させる
    fn finish(self) -> std::result::Result<Member, ParseError> {
        let PendingMember {
            mut member,
            code,
            labels,
            catches,
            lines,
        } = self;

        let mut handlers = Vec::with_capacity(catches.len());
        for c in catches {
            let resolve = |label: &str| {
                labels.get(label).copied().ok_or_else(|| ParseError::UndefinedLabel {
                    line: c.line,
                    label: label.to_string(),
                })
            };
            handlers.push(Handler {
                start: resolve(&c.from)?,
                end: resolve(&c.to)?,
                target: resolve(&c.using)?,
                catch: c.catch.clone(),
            });
        }

        let mut body = Body::new(code);
        body.handlers = handlers;
        body.lines = (!lines.is_empty()).then_some(lines);
        member.body = Some(body);
        Ok(member)
    }
}

/// `.cls` テキストのアセンブラ
pub struct ClassAssembler {
    label_pattern: Regex,
    line_pattern: Regex,
    catch_pattern: Regex,
    hook_pattern: Regex,
}

impl ClassAssembler {
    /// アセンブラを作成する
    pub fn new() -> Result<Self> {
        Ok(Self {
            label_pattern: Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):$")?,
            line_pattern: Regex::new(r"^\.line\s+(\d+)$")?,
            catch_pattern: Regex::new(
                r"^\.catch\s+(\S+)\s+from\s+(\w+)\s+to\s+(\w+)\s+using\s+(\w+)$",
            )?,
            hook_pattern: Regex::new(r#"^hook\.(enter|point)\s+"([^"]*)"$"#)?,
        })
    }

    /// テキストを解析してクラスの一覧を返す
    pub fn parse(&self, src: &str) -> std::result::Result<Vec<ClassFile>, ParseError> {
        let mut classes = Vec::new();
        let mut class: Option<ClassFile> = None;
        let mut pending: Option<PendingMember> = None;

        for (idx, raw) in src.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if pending.is_some() {
                if text == "end" {
                    if let (Some(current), Some(class)) = (pending.take(), class.as_mut()) {
                        class.members.push(current.finish()?);
                    }
                } else if let Some(current) = pending.as_mut() {
                    self.parse_body_line(current, text, line)?;
                }
                continue;
            }

            let tokens: Vec<&str> = text.split_whitespace().collect();
            if let ["class", name, rest @ ..] = tokens.as_slice() {
                let is_interface = match rest {
                    [] => false,
                    ["interface"] => true,
                    _ => {
                        return Err(ParseError::Invalid {
                            line,
                            message: format!("unexpected class attributes '{}'", rest.join(" ")),
                        })
                    }
                };
                classes.extend(class.take());
                let mut next = ClassFile::new(*name);
                next.is_interface = is_interface;
                class = Some(next);
                continue;
            }

            let Some(current_class) = class.as_mut() else {
                return Err(ParseError::Invalid {
                    line,
                    message: "member declared outside of a class".to_string(),
                });
            };

            let member = parse_member_header(&tokens, line)?;
            if member.has_body() {
                pending = Some(PendingMember::new(Member { body: None, ..member }));
            } else {
                current_class.members.push(member);
            }
        }

        if let Some(current) = pending {
            return Err(ParseError::UnterminatedMember {
                member: current.member.name,
            });
        }
        classes.extend(class);
        trace!("Parsed {} classes", classes.len());
        Ok(classes)
    }

    /// 本体の1行を解析する
    fn parse_body_line(
        &self,
        pending: &mut PendingMember,
        text: &str,
        line: usize,
    ) -> std::result::Result<(), ParseError> {
        let pc = pending.code.len();

        if let Some(caps) = self.label_pattern.captures(text) {
            if pending.labels.insert(caps[1].to_string(), pc).is_some() {
                return Err(ParseError::Invalid {
                    line,
                    message: format!("duplicate label '{}'", &caps[1]),
                });
            }
            return Ok(());
        }

        if let Some(caps) = self.line_pattern.captures(text) {
            let number = caps[1].parse().map_err(|e| ParseError::Invalid {
                line,
                message: format!("invalid line number '{}': {}", &caps[1], e),
            })?;
            pending.lines.push(pc, number);
            return Ok(());
        }

        if let Some(caps) = self.catch_pattern.captures(text) {
            let catch = match &caps[1] {
                "*" => None,
                ty => Some(ty.to_string()),
            };
            pending.catches.push(PendingCatch {
                line,
                catch,
                from: caps[2].to_string(),
                to: caps[3].to_string(),
                using: caps[4].to_string(),
            });
            return Ok(());
        }

        if let Some(caps) = self.hook_pattern.captures(text) {
            let id = MethodId::from(&caps[2]);
            let hook = if &caps[1] == "enter" { Hook::Enter(id) } else { Hook::Point(id) };
            pending.code.push(Instr::Hook(hook));
            return Ok(());
        }

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let instr = match tokens.as_slice() {
            ["nop"] => Instr::Nop,
            ["return"] => Instr::Return,
            ["rethrow"] => Instr::Rethrow,
            ["hook.exit"] => Instr::Hook(Hook::Exit),
            ["throw", ty] => Instr::Throw(ty.to_string()),
            ["new", class] => Instr::Invoke(MethodRef::constructor(*class)),
            ["invoke", target] => {
                let (class, member) = target.rsplit_once('.').ok_or_else(|| ParseError::Invalid {
                    line,
                    message: format!("invoke target '{}' must be Class.member", target),
                })?;
                Instr::Invoke(MethodRef::new(class, member))
            }
            _ => {
                return Err(ParseError::UnknownDirective {
                    line,
                    text: text.to_string(),
                })
            }
        };
        pending.code.push(instr);
        Ok(())
    }
}

/// メンバ宣言行（`[abstract|native|static]* method NAME` など）を解析する
///
/// 本体を持つメンバには空の本体を仮置きします。
fn parse_member_header(tokens: &[&str], line: usize) -> std::result::Result<Member, ParseError> {
    let invalid = |message: String| ParseError::Invalid { line, message };

    let keyword_idx = tokens
        .iter()
        .position(|t| matches!(*t, "method" | "constructor" | "static-init"))
        .ok_or_else(|| ParseError::UnknownDirective {
            line,
            text: tokens.join(" "),
        })?;

    let mut modifiers = Modifiers::default();
    for modifier in &tokens[..keyword_idx] {
        match *modifier {
            "abstract" => modifiers.is_abstract = true,
            "native" => modifiers.is_native = true,
            "static" => modifiers.is_static = true,
            other => return Err(invalid(format!("unknown modifier '{}'", other))),
        }
    }

    let (name, kind) = match &tokens[keyword_idx..] {
        ["method", name] => (name.to_string(), MemberKind::Method),
        ["constructor"] => (CONSTRUCTOR_NAME.to_string(), MemberKind::Constructor),
        ["static-init"] => {
            modifiers.is_static = true;
            (CLASS_INIT_NAME.to_string(), MemberKind::ClassInit)
        }
        rest => return Err(invalid(format!("malformed member declaration '{}'", rest.join(" ")))),
    };

    let bodiless = modifiers.is_abstract || modifiers.is_native;
    if bodiless && kind != MemberKind::Method {
        return Err(invalid(format!("{} cannot be abstract or native", name)));
    }

    Ok(Member {
        name,
        kind,
        modifiers,
        body: (!bodiless).then(Body::default),
    })
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Nop => write!(f, "nop"),
            Instr::Invoke(target) if target.member == CONSTRUCTOR_NAME => {
                write!(f, "new {}", target.class)
            }
            Instr::Invoke(target) => write!(f, "invoke {}", target),
            Instr::Throw(ty) => write!(f, "throw {}", ty),
            Instr::Rethrow => write!(f, "rethrow"),
            Instr::Return => write!(f, "return"),
            Instr::Hook(Hook::Enter(id)) => write!(f, "hook.enter \"{}\"", id),
            Instr::Hook(Hook::Exit) => write!(f, "hook.exit"),
            Instr::Hook(Hook::Point(id)) => write!(f, "hook.point \"{}\"", id),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header = Vec::new();
        if self.modifiers.is_abstract {
            header.push("abstract".to_string());
        }
        if self.modifiers.is_native {
            header.push("native".to_string());
        }
        match self.kind {
            MemberKind::Method => {
                if self.modifiers.is_static {
                    header.push("static".to_string());
                }
                header.push(format!("method {}", self.name));
            }
            MemberKind::Constructor => header.push("constructor".to_string()),
            MemberKind::ClassInit => header.push("static-init".to_string()),
        }
        writeln!(f, "{}", header.join(" "))?;

        let Some(body) = &self.body else {
            return Ok(());
        };

        let labels: BTreeSet<usize> = body
            .handlers
            .iter()
            .flat_map(|h| [h.start, h.end, h.target])
            .collect();
        for h in &body.handlers {
            writeln!(
                f,
                "  .catch {} from L{} to L{} using L{}",
                h.catch.as_deref().unwrap_or("*"),
                h.start,
                h.end,
                h.target
            )?;
        }

        let line_entries = body.lines.as_ref().map(|l| l.entries()).unwrap_or_default();
        for pc in 0..=body.code.len() {
            if labels.contains(&pc) {
                writeln!(f, "L{}:", pc)?;
            }
            for entry in line_entries.iter().filter(|e| e.start_pc == pc) {
                writeln!(f, "  .line {}", entry.line)?;
            }
            if let Some(instr) = body.code.get(pc) {
                writeln!(f, "  {}", instr)?;
            }
        }
        writeln!(f, "end")
    }
}

impl fmt::Display for ClassFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_interface {
            writeln!(f, "class {} interface", self.name)?;
        } else {
            writeln!(f, "class {}", self.name)?;
        }
        for member in &self.members {
            write!(f, "{}", member)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# sample program
class com/example/App
static method main
  .line 3
  invoke com/example/App.foo
  .line 4
  return
end
constructor
  .line 1
  return
end
method guarded
  .catch java/lang/IllegalStateException from start to stop using recover
start:
  .line 10
  invoke com/example/App.risky
stop:
  return
recover:
  .line 12
  return
end
abstract method run
native static method hash

class com/example/Shape interface
abstract method area
"#;

    fn parse(src: &str) -> std::result::Result<Vec<ClassFile>, ParseError> {
        ClassAssembler::new().unwrap().parse(src)
    }

    #[test]
    fn test_parse_sample() {
        let classes = parse(SAMPLE).unwrap();
        assert_eq!(classes.len(), 2);

        let app = &classes[0];
        assert_eq!(app.name, "com/example/App");
        assert_eq!(app.members.len(), 5);

        let main = app.find_member("main").unwrap();
        assert!(main.modifiers.is_static);
        let body = main.body.as_ref().unwrap();
        assert_eq!(body.code, vec![Instr::Invoke(MethodRef::new("com/example/App", "foo")), Instr::Return]);
        assert_eq!(body.lines.as_ref().unwrap().range(body.len()).to_string(), "3-4");

        let ctor = app.find_member(CONSTRUCTOR_NAME).unwrap();
        assert_eq!(ctor.kind, MemberKind::Constructor);

        let guarded = app.find_member("guarded").unwrap().body.as_ref().unwrap();
        assert_eq!(
            guarded.handlers,
            vec![Handler {
                start: 0,
                end: 1,
                target: 2,
                catch: Some("java/lang/IllegalStateException".into()),
            }]
        );

        let hash = app.find_member("hash").unwrap();
        assert!(hash.modifiers.is_native && hash.modifiers.is_static);
        assert!(!hash.has_body());

        assert!(classes[1].is_interface);
        assert!(!classes[1].members[0].has_body());
    }

    #[test]
    fn test_print_then_parse_preserves_class() {
        let classes = parse(SAMPLE).unwrap();
        let printed: String = classes.iter().map(|c| c.to_string()).collect();
        assert_eq!(parse(&printed).unwrap(), classes);
    }

    #[test]
    fn test_parse_hooks() {
        let src = "class A\nmethod f\n  hook.enter \"@A:f(0-0)\"\n  hook.exit\n  return\nend\n";
        let classes = parse(src).unwrap();
        let body = classes[0].members[0].body.as_ref().unwrap();
        assert!(body.contains_hooks());
        assert_eq!(body.code[0], Instr::Hook(Hook::Enter(MethodId::from("@A:f(0-0)"))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("class A\nmethod f\n  jump x\nend\n"),
            Err(ParseError::UnknownDirective { line: 3, .. })
        ));
        assert!(matches!(
            parse("class A\nmethod f\n  .catch * from a to b using c\n  return\nend\n"),
            Err(ParseError::UndefinedLabel { line: 3, .. })
        ));
        assert!(matches!(
            parse("class A\nmethod f\n  return\n"),
            Err(ParseError::UnterminatedMember { .. })
        ));
        assert!(matches!(
            parse("method f\n"),
            Err(ParseError::Invalid { line: 1, .. })
        ));
        assert!(matches!(
            parse("class A\nabstract constructor\n"),
            Err(ParseError::Invalid { line: 2, .. })
        ));
    }
}
