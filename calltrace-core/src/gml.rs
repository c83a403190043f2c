//! GML 形式での呼び出しグラフの読み書き
//!
//! 下流の解析ツールが読み込める `graph [ directed 1 node [...] edge [...] ]` 形式を扱います。
//! ラベルの `&` と `"` は HTML 実体参照でエスケープします。

use crate::Result;
use calltrace_ir::MethodId;
use calltrace_recorder::CallGraph;
use std::fmt::Write as _;
use std::io::Write;

/// 呼び出しグラフを GML 形式で書き出す
pub fn write_gml<W: Write>(graph: &CallGraph, out: &mut W) -> Result<()> {
    writeln!(out, "Creator \"calltrace\"")?;
    writeln!(out, "graph [")?;
    writeln!(out, "  directed 1")?;
    for (index, id) in graph.vertices().iter().enumerate() {
        writeln!(out, "  node [")?;
        writeln!(out, "    id {}", index)?;
        writeln!(out, "    label \"{}\"", escape(id.as_str()))?;
        writeln!(out, "  ]")?;
    }
    for edge in graph.edges() {
        writeln!(out, "  edge [")?;
        writeln!(out, "    source {}", edge.source)?;
        writeln!(out, "    target {}", edge.target)?;
        writeln!(out, "    weight {}", edge.weight)?;
        writeln!(out, "  ]")?;
    }
    writeln!(out, "]")?;
    Ok(())
}

/// 呼び出しグラフを GML 文字列にする
pub fn to_string(graph: &CallGraph) -> Result<String> {
    let mut buf = Vec::new();
    write_gml(graph, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn escape(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            c if c.is_ascii() => escaped.push(c),
            c => {
                let _ = write!(escaped, "&#{};", c as u32);
            }
        }
    }
    escaped
}

fn unescape(label: &str) -> Result<String> {
    let mut out = String::with_capacity(label.len());
    let mut rest = label;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let semi = tail
            .find(';')
            .ok_or_else(|| anyhow::anyhow!("Unterminated entity in label {:?}", label))?;
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse))
                    .ok_or_else(|| anyhow::anyhow!("Unknown entity &{}; in label {:?}", entity, label))?
                    .map_err(|e| anyhow::anyhow!("Invalid entity &{}; in label {:?}: {}", entity, label, e))?;
                let c = char::from_u32(code)
                    .ok_or_else(|| anyhow::anyhow!("Invalid character code {} in label {:?}", code, label))?;
                out.push(c);
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Key(String),
    Int(i64),
    Real(f64),
    Str(String),
    Open,
    Close,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                // 行末までコメント
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
            }
            '[' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ']' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(anyhow::anyhow!("Unterminated string at byte {}", start)),
                    }
                }
                tokens.push(Token::Str(unescape(&value)?));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut key = String::new();
                while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_') {
                    key.push(c);
                }
                tokens.push(Token::Key(key));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut number = String::new();
                while let Some((_, c)) = chars.next_if(|&(_, c)| {
                    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
                }) {
                    number.push(c);
                }
                let token = match number.parse::<i64>() {
                    Ok(n) => Token::Int(n),
                    Err(_) => Token::Real(number.parse().map_err(|e| {
                        anyhow::anyhow!("Invalid number {:?} at byte {}: {}", number, start, e)
                    })?),
                };
                tokens.push(token);
            }
            other => {
                return Err(anyhow::anyhow!("Unexpected character {:?} at byte {}", other, start));
            }
        }
    }

    Ok(tokens)
}

/// GML の値
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Real(f64),
    Str(String),
    List(Vec<(String, Value)>),
}

impl Value {
    fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::List(items) => items.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        let items: &[(String, Value)] = match self {
            Value::List(items) => items,
            _ => &[],
        };
        items.iter().filter(move |(k, _)| k == key).map(|(_, v)| v)
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn as_weight(&self) -> Option<u64> {
        match self {
            Value::Int(n) => u64::try_from(*n).ok(),
            Value::Real(r) if *r >= 0.0 => Some(r.round() as u64),
            _ => None,
        }
    }
}

/// `key value` の並びを `]` または入力の終わりまで読む
fn parse_list(tokens: &[Token], pos: &mut usize, nested: bool) -> Result<Vec<(String, Value)>> {
    let mut items = Vec::new();
    loop {
        let key = match tokens.get(*pos) {
            None if nested => return Err(anyhow::anyhow!("Unexpected end of GML input")),
            None => return Ok(items),
            Some(Token::Close) if nested => {
                *pos += 1;
                return Ok(items);
            }
            Some(Token::Key(key)) => key.clone(),
            Some(other) => return Err(anyhow::anyhow!("Expected a key, found {:?}", other)),
        };
        *pos += 1;

        let value = match tokens.get(*pos) {
            Some(Token::Int(n)) => Value::Int(*n),
            Some(Token::Real(r)) => Value::Real(*r),
            Some(Token::Str(s)) => Value::Str(s.clone()),
            Some(Token::Open) => {
                *pos += 1;
                items.push((key, Value::List(parse_list(tokens, pos, true)?)));
                continue;
            }
            other => return Err(anyhow::anyhow!("Missing value for key {:?}: {:?}", key, other)),
        };
        *pos += 1;
        items.push((key, value));
    }
}

/// GML 文書から呼び出しグラフを復元する
///
/// ノードの `label` をメソッド識別子とし、エッジの `weight` を重みとして読み込みます。
/// 重みが無いエッジは重み1とします。
pub fn parse(src: &str) -> Result<CallGraph> {
    let tokens = tokenize(src)?;
    let mut pos = 0;
    let document = Value::List(parse_list(&tokens, &mut pos, false)?);
    let graph_value = document
        .get("graph")
        .ok_or_else(|| anyhow::anyhow!("GML document has no graph"))?;

    let mut labels = std::collections::HashMap::new();
    let mut graph = CallGraph::new();
    for node in graph_value.all("node") {
        let id = node
            .get("id")
            .and_then(Value::as_int)
            .ok_or_else(|| anyhow::anyhow!("GML node without an integer id"))?;
        let label = match node.get("label") {
            Some(Value::Str(label)) => label.clone(),
            _ => return Err(anyhow::anyhow!("GML node {} has no label", id)),
        };
        let method = MethodId::from(label);
        graph.add_vertex(&method);
        labels.insert(id, method);
    }

    for edge in graph_value.all("edge") {
        let endpoint = |key: &str| -> Result<MethodId> {
            let id = edge
                .get(key)
                .and_then(Value::as_int)
                .ok_or_else(|| anyhow::anyhow!("GML edge without an integer {}", key))?;
            labels
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("GML edge refers to unknown node {}", id))
        };
        let source = endpoint("source")?;
        let target = endpoint("target")?;
        let weight = match edge.get("weight") {
            Some(value) => value
                .as_weight()
                .ok_or_else(|| anyhow::anyhow!("GML edge has an invalid weight {:?}", value))?,
            None => 1,
        };
        graph.add_weight(&source, &target, weight);
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MethodId {
        MethodId::from(s)
    }

    #[test]
    fn test_write_layout() {
        let mut graph = CallGraph::new();
        graph.add_call(&id("@Main:main(1-3)"), &id("@Main:foo(5-6)"));
        let text = to_string(&graph).unwrap();
        assert_eq!(
            text,
            concat!(
                "Creator \"calltrace\"\n",
                "graph [\n",
                "  directed 1\n",
                "  node [\n",
                "    id 0\n",
                "    label \"@Main:main(1-3)\"\n",
                "  ]\n",
                "  node [\n",
                "    id 1\n",
                "    label \"@Main:foo(5-6)\"\n",
                "  ]\n",
                "  edge [\n",
                "    source 0\n",
                "    target 1\n",
                "    weight 1\n",
                "  ]\n",
                "]\n",
            )
        );
    }

    #[test]
    fn test_labels_are_escaped() {
        assert_eq!(escape("a&b\"c"), "a&amp;b&quot;c");
        assert_eq!(escape("é"), "&#233;");
        assert_eq!(unescape("a&amp;b&quot;c&#233;&#x41;").unwrap(), "a&b\"céA");
        assert!(unescape("a&b").is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut graph = CallGraph::new();
        let main = id("com.example@Main:main(3-9)");
        let foo = id("com.example@Main$1:foo(11-12)");
        let odd = id("x@Q:\"&\"(0-0)");
        graph.add_call(&main, &foo);
        graph.add_call(&foo, &foo);
        graph.add_weight(&main, &odd, 41);
        graph.add_vertex(&id("@Lonely:run(1-1)"));

        let restored = parse(&to_string(&graph).unwrap()).unwrap();
        assert_eq!(restored.vertices(), graph.vertices());
        assert_eq!(restored.edges(), graph.edges());
    }

    #[test]
    fn test_parse_foreign_document() {
        let src = r#"
graph [
  # written by another tool
  directed 1
  node [ id 10 label "a" ]
  node [ id 20 label "b" ]
  edge [ source 10 target 20 weight 3.0 ]
  edge [ source 20 target 10 ]
]
"#;
        let graph = parse(src).unwrap();
        assert_eq!(graph.edge_weight(&id("a"), &id("b")), Some(3));
        assert_eq!(graph.edge_weight(&id("b"), &id("a")), Some(1));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("graph [ node [ id 0 ]").is_err());
        assert!(parse("graph [ edge [ source 0 target 1 ] ]").is_err());
        assert!(parse("Creator \"x\"").is_err());
    }
}
