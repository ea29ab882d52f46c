use crate::ast::{
    BoolExpr, Comment, Composite, Condition, ConditionalBlock, ConditionalRule, ConstantRef,
    Declaration, Definition, FunctionCall, Node, RuleKind, Ruleset, Selector, SelectorPart,
    Separator, StringLiteral, Stylesheet, UnknownAtRule, Value,
};
use crate::error::{CompileError, Result, Span};

pub fn parse(source_name: &str, input: &str) -> Result<Stylesheet> {
    let mut parser = Parser::new(input);
    let root = parser.parse_block_items(false)?;
    Ok(Stylesheet::new(source_name, root))
}

/// `[A-Z_][A-Z0-9_]*` names a constant.
pub fn is_constant_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && name.chars().any(|c| c.is_ascii_uppercase())
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

type Checkpoint = (usize, usize, usize);

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn checkpoint(&self) -> Checkpoint {
        (self.pos, self.line, self.column)
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        (self.pos, self.line, self.column) = checkpoint;
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(CompileError::parse(message, self.span()))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => self.error(format!("Expected '{}' but found '{}'", expected, c)),
            None => self.error(format!("Expected '{}' but reached end of input", expected)),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Skips whitespace and comments, collecting the comments.
    fn skip_trivia(&mut self, comments: &mut Vec<Comment>) -> Result<()> {
        loop {
            self.skip_whitespace();
            if !self.starts_with("/*") {
                return Ok(());
            }
            let span = self.span();
            let text = self.read_comment()?;
            comments.push(Comment { text, span });
        }
    }

    fn skip_value_trivia(&mut self) -> Result<()> {
        let mut discarded = Vec::new();
        self.skip_trivia(&mut discarded)
    }

    fn read_comment(&mut self) -> Result<String> {
        let start = self.pos;
        self.bump_n(2);
        while !self.starts_with("*/") {
            if self.bump().is_none() {
                return self.error("Unterminated comment");
            }
        }
        self.bump_n(2);
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_char(c) {
                break;
            }
            ident.push(c);
            self.bump();
        }
        ident
    }

    /// An identifier that may contain dots between segments (`icons.arrow`).
    fn read_dotted_ident(&mut self) -> String {
        let mut ident = self.read_ident();
        while self.peek() == Some('.') && self.peek_at(1).map_or(false, is_ident_start) {
            self.bump();
            ident.push('.');
            ident.push_str(&self.read_ident());
        }
        ident
    }

    fn read_string(&mut self) -> Result<StringLiteral> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return self.error("Unterminated string"),
                Some('\\') => {
                    value.push('\\');
                    if let Some(next) = self.bump() {
                        value.push(next);
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => value.push(c),
            }
        }
        Ok(StringLiteral { value, quote })
    }

    /// Raw text up to (not including) the first top-level char in `stops`.
    fn read_raw_until(&mut self, stops: &[char]) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            if depth == 0 && stops.contains(&c) {
                break;
            }
            match c {
                '"' | '\'' => {
                    let literal = self.read_string()?;
                    text.push(literal.quote);
                    text.push_str(&literal.value);
                    text.push(literal.quote);
                    continue;
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.read_comment()?;
                    text.push(' ');
                    continue;
                }
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                _ => {}
            }
            text.push(c);
            self.bump();
        }
        Ok(text)
    }

    /// `(...)` including the parentheses, verbatim.
    fn read_balanced_parens(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return self.error("Unbalanced parentheses"),
                Some('"') | Some('\'') => {
                    let literal = self.read_string()?;
                    text.push(literal.quote);
                    text.push_str(&literal.value);
                    text.push(literal.quote);
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(text);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn parse_block_items(&mut self, nested: bool) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut comments = Vec::new();

        loop {
            self.skip_trivia(&mut comments)?;
            match self.peek() {
                None => {
                    if nested {
                        return self.error("Unexpected end of input, expected '}'");
                    }
                    break;
                }
                Some('}') => {
                    if !nested {
                        return self.error("Unexpected '}'");
                    }
                    self.bump();
                    break;
                }
                Some(';') => {
                    self.bump();
                }
                Some('@') => {
                    nodes.extend(comments.drain(..).map(Node::Comment));
                    nodes.push(self.parse_at_rule()?);
                }
                Some(_) => {
                    let attached = comments.drain(..).map(|c| c.text).collect();
                    if self.item_is_ruleset() {
                        nodes.push(Node::Ruleset(self.parse_ruleset(attached)?));
                    } else {
                        nodes.push(Node::Declaration(self.parse_declaration(attached)?));
                    }
                }
            }
        }

        nodes.extend(comments.into_iter().map(Node::Comment));
        Ok(nodes)
    }

    fn item_is_ruleset(&self) -> bool {
        let mut quote: Option<char> = None;
        let mut depth = 0usize;
        for &c in &self.chars[self.pos..] {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '{' if depth == 0 => return true,
                ';' | '}' if depth == 0 => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_ruleset(&mut self, comments: Vec<String>) -> Result<Ruleset> {
        let span = self.span();
        let prelude = self.read_raw_until(&['{'])?;
        self.expect('{')?;

        let mut selectors = Vec::new();
        for text in split_top_level(&prelude, ',') {
            let text = collapse_whitespace(&text);
            if text.is_empty() {
                return Err(CompileError::parse("Missing selector before '{'", span));
            }
            selectors.push(parse_selector(&text));
        }

        let block = self.parse_block_items(true)?;
        Ok(Ruleset {
            selectors,
            block,
            comments,
            span,
        })
    }

    fn parse_declaration(&mut self, comments: Vec<String>) -> Result<Declaration> {
        let span = self.span();
        let property = self.read_raw_until(&[':', ';', '{', '}'])?;
        let property = property.trim().to_string();
        if self.peek() != Some(':') || property.is_empty() {
            return Err(CompileError::parse(
                format!("Invalid declaration line: '{}'", property),
                span,
            ));
        }
        self.bump();

        let value = self.parse_value_list(&[';', '}', '!'])?;
        let mut important = false;
        if self.peek() == Some('!') {
            self.bump();
            self.skip_whitespace();
            let flag = self.read_ident();
            if !flag.eq_ignore_ascii_case("important") {
                return self.error(format!("Unknown flag '!{}'", flag));
            }
            important = true;
            self.skip_value_trivia()?;
        }
        if value.is_empty() {
            return Err(CompileError::parse(
                format!("Missing value for property '{}'", property),
                span,
            ));
        }
        if self.peek() == Some(';') {
            self.bump();
        }

        Ok(Declaration {
            property,
            value,
            important,
            comments,
            span,
        })
    }

    fn parse_at_rule(&mut self) -> Result<Node> {
        let span = self.span();
        self.bump();
        let name = self.read_ident();

        match name.as_str() {
            "" => self.error("Missing at-rule name after '@'"),
            "def" => self.parse_definition(span),
            "if" => self.parse_conditional(span),
            "elseif" | "else" => Err(CompileError::parse(
                format!("@{} without a preceding @if", name),
                span,
            )),
            "external" => {
                let params = self.parse_external_names()?;
                if self.peek() == Some('{') {
                    return self.error("@external does not accept a block");
                }
                if self.peek() == Some(';') {
                    self.bump();
                }
                Ok(Node::AtRule(UnknownAtRule {
                    name,
                    params,
                    block: None,
                    span,
                }))
            }
            _ => {
                let prelude = collapse_whitespace(&self.read_raw_until(&['{', ';', '}'])?);
                let params = if prelude.is_empty() {
                    Vec::new()
                } else {
                    vec![Value::Literal(prelude)]
                };
                let block = match self.peek() {
                    Some('{') => {
                        self.bump();
                        Some(self.parse_block_items(true)?)
                    }
                    Some(';') => {
                        self.bump();
                        None
                    }
                    _ => None,
                };
                Ok(Node::AtRule(UnknownAtRule {
                    name,
                    params,
                    block,
                    span,
                }))
            }
        }
    }

    fn parse_definition(&mut self, span: Span) -> Result<Node> {
        self.skip_whitespace();
        let name = self.read_ident();
        if name.is_empty() {
            return self.error("Missing constant name after @def");
        }
        let params = self.parse_value_list(&[';', '}', '{'])?;
        if params.is_empty() {
            return Err(CompileError::parse(
                format!("Missing value for constant '{}'", name),
                span,
            ));
        }
        self.expect(';')?;
        Ok(Node::Definition(Definition { name, params, span }))
    }

    fn parse_conditional(&mut self, span: Span) -> Result<Node> {
        let mut rules = Vec::new();

        let condition = self.parse_condition()?;
        let block = self.parse_block_items(true)?;
        rules.push(ConditionalRule {
            kind: RuleKind::If,
            condition: Some(Condition::Static(condition)),
            block,
            span,
        });

        loop {
            let checkpoint = self.checkpoint();
            self.skip_value_trivia()?;
            let rule_span = self.span();

            if self.starts_with("@elseif") && !self.peek_at(7).map_or(false, is_ident_char) {
                self.bump_n(7);
                let condition = self.parse_condition()?;
                let block = self.parse_block_items(true)?;
                rules.push(ConditionalRule {
                    kind: RuleKind::ElseIf,
                    condition: Some(Condition::Static(condition)),
                    block,
                    span: rule_span,
                });
            } else if self.starts_with("@else") && !self.peek_at(5).map_or(false, is_ident_char) {
                self.bump_n(5);
                self.skip_value_trivia()?;
                self.expect('{')?;
                let block = self.parse_block_items(true)?;
                rules.push(ConditionalRule {
                    kind: RuleKind::Else,
                    condition: None,
                    block,
                    span: rule_span,
                });
                break;
            } else {
                self.restore(checkpoint);
                break;
            }
        }

        Ok(Node::ConditionalBlock(ConditionalBlock::new(rules, span)))
    }

    /// The boolean expression of an `@if`/`@elseif`, consuming the `{`.
    fn parse_condition(&mut self) -> Result<BoolExpr> {
        let expr = self.parse_or()?;
        self.skip_value_trivia()?;
        self.expect('{')?;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<BoolExpr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_value_trivia()?;
            if !self.starts_with("||") {
                return Ok(left);
            }
            self.bump_n(2);
            let right = self.parse_and()?;
            left = BoolExpr::Or(Box::new(left), Box::new(right));
        }
    }

    fn parse_and(&mut self) -> Result<BoolExpr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_value_trivia()?;
            if !self.starts_with("&&") {
                return Ok(left);
            }
            self.bump_n(2);
            let right = self.parse_unary()?;
            left = BoolExpr::And(Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<BoolExpr> {
        self.skip_value_trivia()?;
        match self.peek() {
            Some('!') => {
                self.bump();
                Ok(BoolExpr::Not(Box::new(self.parse_unary()?)))
            }
            Some('(') => {
                self.bump();
                let inner = self.parse_or()?;
                self.skip_value_trivia()?;
                self.expect(')')?;
                Ok(inner)
            }
            _ => self.parse_condition_atom(),
        }
    }

    fn parse_condition_atom(&mut self) -> Result<BoolExpr> {
        let mut atom = self.read_dotted_ident();
        while self.peek() == Some(':') && self.peek_at(1).map_or(false, is_ident_char) {
            self.bump();
            atom.push(':');
            atom.push_str(&self.read_dotted_ident());
        }
        if atom.is_empty() {
            return self.error("Expected a condition");
        }
        if self.peek() == Some('(') {
            atom.push_str(&self.read_balanced_parens()?);
            return Ok(BoolExpr::Constant(atom));
        }
        Ok(match atom.as_str() {
            "true" => BoolExpr::True,
            "false" => BoolExpr::False,
            _ => BoolExpr::Constant(atom),
        })
    }

    /// Space separated values; top-level commas build one comma composite.
    /// `@external` takes class names and `prefix*` patterns, quoted or not.
    fn parse_external_names(&mut self) -> Result<Vec<Value>> {
        let mut names = Vec::new();
        loop {
            self.skip_value_trivia()?;
            match self.peek() {
                None | Some(';') | Some('{') | Some('}') => break,
                Some(',') => {
                    self.bump();
                }
                Some('"') | Some('\'') => names.push(Value::String(self.read_string()?)),
                Some(_) => {
                    let mut name = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_whitespace() || ",;{}".contains(c) {
                            break;
                        }
                        name.push(c);
                        self.bump();
                    }
                    names.push(Value::Literal(name));
                }
            }
        }
        Ok(names)
    }

    fn parse_value_list(&mut self, stops: &[char]) -> Result<Vec<Value>> {
        let mut groups: Vec<Vec<Value>> = vec![Vec::new()];

        loop {
            self.skip_value_trivia()?;
            match self.peek() {
                None => break,
                Some(c) if stops.contains(&c) => break,
                Some(',') => {
                    self.bump();
                    groups.push(Vec::new());
                }
                Some('/') => {
                    self.bump();
                    self.skip_value_trivia()?;
                    let next = self.parse_term()?;
                    let group = groups.last_mut().map(std::mem::take).unwrap_or_default();
                    let merged = append_slash(group, next);
                    if let Some(last) = groups.last_mut() {
                        *last = merged;
                    }
                }
                Some(_) => {
                    let term = self.parse_term()?;
                    if let Some(group) = groups.last_mut() {
                        group.push(term);
                    }
                }
            }
        }

        if groups.len() == 1 {
            return Ok(groups.pop().unwrap_or_default());
        }
        if groups.iter().any(Vec::is_empty) {
            return self.error("Empty value around ','");
        }
        Ok(vec![Value::Composite(Composite {
            values: groups.into_iter().map(group_to_value).collect(),
            separator: Separator::Comma,
        })])
    }

    fn parse_function_args(&mut self, name: &str) -> Result<Vec<Value>> {
        self.expect('(')?;
        self.skip_value_trivia()?;

        if name.eq_ignore_ascii_case("url") && !matches!(self.peek(), Some('"') | Some('\'')) {
            let raw = self.read_raw_until(&[')'])?;
            self.expect(')')?;
            return Ok(vec![Value::Literal(raw.trim().to_string())]);
        }

        let mut args = Vec::new();
        let mut current = Vec::new();
        loop {
            self.skip_value_trivia()?;
            match self.peek() {
                None => return self.error(format!("Unterminated call to '{}'", name)),
                Some(')') => {
                    self.bump();
                    break;
                }
                Some(',') => {
                    self.bump();
                    if current.is_empty() {
                        return self.error(format!("Empty argument in call to '{}'", name));
                    }
                    args.push(group_to_value(std::mem::take(&mut current)));
                }
                Some('/') => {
                    self.bump();
                    self.skip_value_trivia()?;
                    let next = self.parse_term()?;
                    current = append_slash(std::mem::take(&mut current), next);
                }
                Some(_) => current.push(self.parse_term()?),
            }
        }
        if !current.is_empty() {
            args.push(group_to_value(current));
        }
        Ok(args)
    }

    fn parse_term(&mut self) -> Result<Value> {
        let span = self.span();
        let c = match self.peek() {
            Some(c) => c,
            None => return self.error("Expected a value"),
        };

        if c == '"' || c == '\'' {
            return Ok(Value::String(self.read_string()?));
        }

        if c == '#' {
            self.bump();
            return Ok(Value::Literal(format!("#{}", self.read_ident())));
        }

        if self.at_number() {
            return Ok(self.read_number());
        }

        if c == '(' {
            return Ok(Value::Literal(self.read_balanced_parens()?));
        }

        if is_ident_start(c) {
            let ident = self.read_dotted_ident();
            if self.peek() == Some('(') {
                let args = self.parse_function_args(&ident)?;
                return Ok(Value::Function(FunctionCall {
                    name: ident,
                    args,
                    span,
                }));
            }
            if is_constant_name(&ident) {
                return Ok(Value::ConstantRef(ConstantRef { name: ident, span }));
            }
            return Ok(Value::Literal(ident));
        }

        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || ",;{}()!/\"'".contains(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        if text.is_empty() {
            return self.error(format!("Unexpected character '{}'", c));
        }
        Ok(Value::Literal(text))
    }

    fn at_number(&self) -> bool {
        let digit_at = |offset: usize| self.peek_at(offset).map_or(false, |c| c.is_ascii_digit());
        match self.peek() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => digit_at(1),
            Some('+') | Some('-') => digit_at(1) || (self.peek_at(1) == Some('.') && digit_at(2)),
            _ => false,
        }
    }

    fn read_number(&mut self) -> Value {
        let mut number = String::new();
        if let Some(sign @ ('+' | '-')) = self.peek() {
            number.push(sign);
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |n| n.is_ascii_digit())) {
                number.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let unit = if self.peek() == Some('%') {
            self.bump();
            "%".to_string()
        } else {
            let mut unit = String::new();
            while let Some(c) = self.peek() {
                if !c.is_ascii_alphabetic() {
                    break;
                }
                unit.push(c);
                self.bump();
            }
            unit
        };

        Value::numeric(number, unit)
    }
}

fn group_to_value(mut group: Vec<Value>) -> Value {
    if group.len() == 1 {
        if let Some(value) = group.pop() {
            return value;
        }
    }
    Value::Composite(Composite {
        values: group,
        separator: Separator::Space,
    })
}

/// `a b` `/` `c` becomes `a b/c`.
fn append_slash(mut group: Vec<Value>, next: Value) -> Vec<Value> {
    match group.pop() {
        Some(Value::Composite(mut composite)) if composite.separator == Separator::Slash => {
            composite.values.push(next);
            group.push(Value::Composite(composite));
        }
        Some(previous) => group.push(Value::Composite(Composite {
            values: vec![previous, next],
            separator: Separator::Slash,
        })),
        None => group.push(next),
    }
    group
}

fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_selector(text: &str) -> Selector {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut pending = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            pending.push(c);
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            '.' if bracket_depth == 0
                && chars.get(i + 1).map_or(false, |&n| is_ident_start(n)) =>
            {
                if !pending.is_empty() {
                    parts.push(SelectorPart::Text(std::mem::take(&mut pending)));
                }
                let mut name = String::new();
                i += 1;
                while i < chars.len() && is_ident_char(chars[i]) {
                    name.push(chars[i]);
                    i += 1;
                }
                parts.push(SelectorPart::Class(name));
                continue;
            }
            _ => {}
        }
        pending.push(c);
        i += 1;
    }
    if !pending.is_empty() {
        parts.push(SelectorPart::Text(pending));
    }

    Selector { parts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_root(source: &str) -> Vec<Node> {
        parse("test.gss", source).expect("parse").root
    }

    fn only_ruleset(source: &str) -> Ruleset {
        match parse_root(source).into_iter().next() {
            Some(Node::Ruleset(ruleset)) => ruleset,
            other => panic!("expected ruleset, got {:?}", other),
        }
    }

    #[test]
    fn splits_class_selectors() {
        let ruleset = only_ruleset(".a .b-c:hover, div.d[data-x=\".e\"] { color: red }");
        assert_eq!(ruleset.selectors.len(), 2);
        assert_eq!(
            ruleset.selectors[0].class_names().collect::<Vec<_>>(),
            vec!["a", "b-c"]
        );
        assert_eq!(
            ruleset.selectors[1].class_names().collect::<Vec<_>>(),
            vec!["d"]
        );
        assert_eq!(ruleset.selectors[1].to_string(), "div.d[data-x=\".e\"]");
    }

    #[test]
    fn parses_declaration_values() {
        let ruleset = only_ruleset(
            ".a { font: 12px/1.5 Arial, sans-serif; margin: -2px 0 !important; width: add(W, 2px) }",
        );
        let Node::Declaration(font) = &ruleset.block[0] else {
            panic!("expected declaration");
        };
        assert_eq!(font.value.len(), 1);
        assert_eq!(font.value[0].to_string(), "12px/1.5 Arial,sans-serif");

        let Node::Declaration(margin) = &ruleset.block[1] else {
            panic!("expected declaration");
        };
        assert!(margin.important);
        assert_eq!(margin.value, vec![Value::numeric("-2", "px"), Value::numeric("0", "")]);

        let Node::Declaration(width) = &ruleset.block[2] else {
            panic!("expected declaration");
        };
        let Value::Function(call) = &width.value[0] else {
            panic!("expected function");
        };
        assert_eq!(call.name, "add");
        assert!(matches!(&call.args[0], Value::ConstantRef(r) if r.name == "W"));
    }

    #[test]
    fn parses_definitions_and_external() {
        let root = parse_root("@def PADDING 2px 4px;\n@external foo bar-*;");
        let Node::Definition(def) = &root[0] else {
            panic!("expected definition");
        };
        assert_eq!(def.name, "PADDING");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.span, Span::new(1, 1));

        let Node::AtRule(external) = &root[1] else {
            panic!("expected at-rule");
        };
        assert_eq!(external.name, "external");
        assert_eq!(external.span, Span::new(2, 1));
        assert_eq!(
            external.params.iter().map(Value::concrete_text).collect::<Vec<_>>(),
            vec!["foo", "bar-*"]
        );
    }

    #[test]
    fn parses_conditional_chain() {
        let root = parse_root(
            "@if (is(\"user.agent\", \"ie6\") && !MOBILE) { .a{color:red} }\n\
             @elseif eval(\"cfg.dark()\") { .a{color:black} }\n\
             @else { .a{color:blue} }",
        );
        assert_eq!(root.len(), 1);
        let Node::ConditionalBlock(block) = &root[0] else {
            panic!("expected conditional block");
        };
        let kinds: Vec<_> = block.rules.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RuleKind::If, RuleKind::ElseIf, RuleKind::Else]);
        assert_eq!(
            block.rules[0].condition,
            Some(Condition::Static(BoolExpr::And(
                Box::new(BoolExpr::Constant("is(\"user.agent\", \"ie6\")".into())),
                Box::new(BoolExpr::Not(Box::new(BoolExpr::Constant("MOBILE".into())))),
            )))
        );
        assert_eq!(
            block.rules[1].condition,
            Some(Condition::Static(BoolExpr::Constant(
                "eval(\"cfg.dark()\")".into()
            )))
        );
    }

    #[test]
    fn attaches_comments_to_following_node() {
        let ruleset = only_ruleset("/* @noflip */ .a { /* @alternate */ left: 0 }");
        assert!(ruleset.has_comment("@noflip"));
        let Node::Declaration(left) = &ruleset.block[0] else {
            panic!("expected declaration");
        };
        assert!(left.has_comment("@alternate"));
    }

    #[test]
    fn keeps_other_at_rules() {
        let root = parse_root("@media screen and (max-width: 100px) { .a { top: 0 } }");
        let Node::AtRule(media) = &root[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(media.params, vec![Value::literal("screen and (max-width: 100px)")]);
        assert_eq!(media.block.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn reports_errors_with_location() {
        let err = parse("test.gss", ".a {\n  color red;\n}").unwrap_err();
        match err {
            CompileError::Parse { span, message } => {
                assert_eq!(span, Span::new(2, 3));
                assert!(message.contains("Invalid declaration"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert!(parse("test.gss", "@else { .a{top:0} }").is_err());
        assert!(parse("test.gss", ".a { top: 0").is_err());
    }

    #[test]
    fn constant_names() {
        assert!(is_constant_name("MOBILE"));
        assert!(is_constant_name("BG_COLOR_2"));
        assert!(!is_constant_name("Mobile"));
        assert!(!is_constant_name("_"));
        assert!(!is_constant_name("2X"));
    }
}
