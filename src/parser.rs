//! §4.2/§4.3: the recursive-descent, line-oriented parser. Consumes logical
//! lines from a stack of [`LineFeeder`]s (the stack is how `source`
//! inclusion "pastes" a file in place: the included file's feeder sits on
//! top until exhausted, then control falls back to the includer) and builds
//! the menu-node tree directly into the owning [`Kconfig`].

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{KconfigError, Location, Result, Warning};
use crate::expr::Expr;
use crate::ids::{NodeId, SymbolId};
use crate::lexer::{tokenize_line, LineFeeder, Token, TokenKind};
use crate::menu::{Item, NodeData};
use crate::symbol::{ChoiceData, SymType};
use crate::Kconfig;

pub struct Parser<'k> {
    kc: &'k mut Kconfig,
    feeders: Vec<LineFeeder>,
    srctree: Option<PathBuf>,
    warnings: Vec<Warning>,
}

impl<'k> Parser<'k> {
    pub fn new(kc: &'k mut Kconfig, srctree: Option<PathBuf>) -> Self {
        Self {
            kc,
            feeders: Vec::new(),
            srctree,
            warnings: Vec::new(),
        }
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    /// Parses `path` as the root Kconfig file and returns the root node
    /// (always an `Item::Menu`, carrying `mainmenu`'s prompt if one was
    /// declared).
    pub fn parse_root(&mut self, path: &Path) -> Result<NodeId> {
        let text = self.read_file(path, None)?;
        let file: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
        self.feeders.push(LineFeeder::new(file.clone(), &text));

        let root = self.kc.push_node(NodeData::new(Item::Menu, file, 0));
        self.parse_block(root, Expr::yes(), Expr::yes(), None)?;
        Ok(root)
    }

    fn read_file(&self, path: &Path, relative_to: Option<&Path>) -> Result<String> {
        let direct = match relative_to {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        if let Ok(text) = fs::read_to_string(&direct) {
            return Ok(text);
        }
        if path.is_relative()
            && let Some(srctree) = &self.srctree {
                let joined = srctree.join(path);
                if let Ok(text) = fs::read_to_string(&joined) {
                    return Ok(text);
                }
            }
        Err(KconfigError::NotFound {
            path: direct,
            srctree: self.srctree.clone(),
        })
    }

    fn next_line(&mut self) -> Option<(String, u32, Rc<str>)> {
        loop {
            let feeder = self.feeders.last_mut()?;
            if let Some((line, no)) = feeder.next_line() {
                return Some((line, no, feeder.file.clone()));
            }
            self.feeders.pop();
        }
    }

    fn push_back(&mut self, line: String, no: u32) {
        if let Some(feeder) = self.feeders.last_mut() {
            feeder.push_back(line, no);
        }
    }

    /// Parses entries until `terminator` is seen (consuming it) or, if
    /// `terminator` is `None`, until input is exhausted.
    fn parse_block(
        &mut self,
        parent: NodeId,
        enclosing_dep: Expr,
        enclosing_visible: Expr,
        terminator: Option<TokenKind>,
    ) -> Result<()> {
        let mut last_sibling: Option<NodeId> = None;

        loop {
            let Some((line, line_no, file)) = self.next_line() else {
                if let Some(term) = terminator {
                    return Err(KconfigError::Syntax {
                        location: Location {
                            file: self.kc.node(parent).file.clone(),
                            line: self.kc.node(parent).linenr,
                        },
                        message: format!("unexpected end of file, expected {term:?}"),
                    });
                }
                return Ok(());
            };
            let tokens = tokenize_line(&line, &file, line_no)?;
            if tokens.is_empty() {
                continue;
            }

            if let Some(term) = &terminator
                && &tokens[0].kind == term {
                    return Ok(());
                }

            let new_node = match &tokens[0].kind {
                TokenKind::Config => {
                    Some(self.parse_config(&file, line_no, &tokens, false, &enclosing_dep, &enclosing_visible)?)
                }
                TokenKind::MenuConfig => {
                    Some(self.parse_config(&file, line_no, &tokens, true, &enclosing_dep, &enclosing_visible)?)
                }
                TokenKind::Choice => {
                    Some(self.parse_choice(&file, line_no, &tokens, &enclosing_dep, &enclosing_visible)?)
                }
                TokenKind::Menu => Some(self.parse_menu(&file, line_no, &tokens, &enclosing_dep, &enclosing_visible)?),
                TokenKind::CommentKw => Some(self.parse_comment(&file, line_no, &tokens, &enclosing_dep)?),
                TokenKind::If => Some(self.parse_if(&file, line_no, &tokens, &enclosing_dep, &enclosing_visible)?),
                TokenKind::Source => {
                    self.parse_source(&tokens, &file, line_no)?;
                    None
                }
                TokenKind::MainMenu => {
                    self.parse_mainmenu(&tokens, &file, line_no)?;
                    None
                }
                TokenKind::EndMenu | TokenKind::EndIf | TokenKind::EndChoice => {
                    return Err(KconfigError::Syntax {
                        location: Location { file: file.clone(), line: line_no },
                        message: "unexpected block terminator".to_string(),
                    });
                }
                other => {
                    return Err(KconfigError::Syntax {
                        location: Location { file: file.clone(), line: line_no },
                        message: format!("unrecognized construct, found {other:?}"),
                    });
                }
            };

            if let Some(node) = new_node {
                self.link_sibling(parent, &mut last_sibling, node);
            }
        }
    }

    fn link_sibling(&mut self, parent: NodeId, last_sibling: &mut Option<NodeId>, node: NodeId) {
        self.kc.node(node).parent.set(Some(parent));
        match last_sibling {
            Some(prev) => self.kc.node(*prev).next.set(Some(node)),
            None => self.kc.node(parent).list.set(Some(node)),
        }
        *last_sibling = Some(node);
    }

    // ---- entries -----------------------------------------------------

    fn parse_config(
        &mut self,
        file: &Rc<str>,
        line_no: u32,
        tokens: &[Token],
        is_menuconfig: bool,
        enclosing_dep: &Expr,
        enclosing_visible: &Expr,
    ) -> Result<NodeId> {
        let name = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::Ident(n)) => n.clone(),
            _ => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: "expected symbol name after config".to_string(),
                })
            }
        };
        let sym_id = self.kc.lookup_or_create(&name);
        let node = self.kc.push_node(NodeData::new(Item::Symbol(sym_id), file.clone(), line_no));
        self.kc.node_mut(node).is_menuconfig = is_menuconfig;
        self.kc.sym(sym_id).nodes.borrow_mut().push(node);

        let props = self.parse_properties(PropContext::Config)?;
        self.apply_symbol_properties(node, sym_id, props, file, line_no, enclosing_dep, enclosing_visible);
        Ok(node)
    }

    fn parse_choice(
        &mut self,
        file: &Rc<str>,
        line_no: u32,
        tokens: &[Token],
        enclosing_dep: &Expr,
        enclosing_visible: &Expr,
    ) -> Result<NodeId> {
        let name = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::StringLit(n)) => Some(n.clone()),
            _ => None,
        };
        let choice_id = self.kc.push_choice(ChoiceData::new(name));
        let node = self.kc.push_node(NodeData::new(Item::Choice(choice_id), file.clone(), line_no));
        self.kc.choice(choice_id).nodes.borrow_mut().push(node);

        let props = self.parse_properties(PropContext::Choice)?;
        let dep = enclosing_dep.clone().and(props.dep_accum);
        let visible = enclosing_visible.clone().and(props.visible_accum);
        self.kc.node_mut(node).dep = dep.clone();
        self.kc.node_mut(node).visibility = visible.clone();
        if let Some((text, cond)) = props.prompt {
            let final_cond = cond.unwrap_or_else(Expr::yes).and(dep.clone());
            self.kc.node_mut(node).prompt = Some((text, Some(final_cond)));
        }
        if let Some(t) = props.type_ {
            self.kc.choice(choice_id).type_.set(t);
        }
        self.kc.choice(choice_id).is_optional.set(props.optional);
        for (sym_id, cond) in props.choice_defaults {
            self.kc.choice(choice_id).defaults.borrow_mut().push((sym_id, cond));
        }
        if let Some(help) = props.help {
            self.kc.node_mut(node).help = Some(help);
        }

        self.parse_block(node, dep, visible, Some(TokenKind::EndChoice))?;
        Ok(node)
    }

    fn parse_menu(
        &mut self,
        file: &Rc<str>,
        line_no: u32,
        tokens: &[Token],
        enclosing_dep: &Expr,
        enclosing_visible: &Expr,
    ) -> Result<NodeId> {
        let title = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::StringLit(s)) => self.expand_refs(s),
            _ => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: "expected prompt string after menu".to_string(),
                })
            }
        };
        let node = self.kc.push_node(NodeData::new(Item::Menu, file.clone(), line_no));

        let props = self.parse_properties(PropContext::Menu)?;
        let dep = enclosing_dep.clone().and(props.dep_accum);
        let visible = enclosing_visible.clone().and(props.visible_accum);
        self.kc.node_mut(node).dep = dep.clone();
        self.kc.node_mut(node).visibility = visible.clone();
        let prompt_cond = props
            .prompt
            .and_then(|(_, c)| c)
            .unwrap_or_else(Expr::yes)
            .and(dep.clone());
        self.kc.node_mut(node).prompt = Some((title, Some(prompt_cond)));
        if let Some(help) = props.help {
            self.kc.node_mut(node).help = Some(help);
        }

        self.parse_block(node, dep, visible, Some(TokenKind::EndMenu))?;
        Ok(node)
    }

    fn parse_comment(&mut self, file: &Rc<str>, line_no: u32, tokens: &[Token], enclosing_dep: &Expr) -> Result<NodeId> {
        let title = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::StringLit(s)) => self.expand_refs(s),
            _ => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: "expected prompt string after comment".to_string(),
                })
            }
        };
        let node = self.kc.push_node(NodeData::new(Item::Comment, file.clone(), line_no));
        let props = self.parse_properties(PropContext::Comment)?;
        let dep = enclosing_dep.clone().and(props.dep_accum);
        self.kc.node_mut(node).dep = dep.clone();
        self.kc.node_mut(node).prompt = Some((title, Some(dep)));
        Ok(node)
    }

    fn parse_if(
        &mut self,
        file: &Rc<str>,
        line_no: u32,
        tokens: &[Token],
        enclosing_dep: &Expr,
        enclosing_visible: &Expr,
    ) -> Result<NodeId> {
        let mut cursor = Cursor::new(&tokens[1..]);
        let cond = self.parse_expr(&mut cursor, file, line_no)?;
        let node = self.kc.push_node(NodeData::new(Item::If, file.clone(), line_no));
        let dep = enclosing_dep.clone().and(cond);
        self.kc.node_mut(node).dep = dep.clone();
        self.parse_block(node, dep, enclosing_visible.clone(), Some(TokenKind::EndIf))?;
        Ok(node)
    }

    fn parse_source(&mut self, tokens: &[Token], file: &Rc<str>, line_no: u32) -> Result<()> {
        let raw = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::StringLit(s)) => s.clone(),
            _ => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: "expected path string after source".to_string(),
                })
            }
        };
        let path_str = self.expand_refs(&raw);
        let base_dir = Path::new(file.as_ref()).parent().map(|p| p.to_path_buf());
        let text = self.read_file(Path::new(&path_str), base_dir.as_deref())?;
        let new_file: Rc<str> = Rc::from(path_str.as_str());
        self.feeders.push(LineFeeder::new(new_file, &text));
        Ok(())
    }

    fn parse_mainmenu(&mut self, tokens: &[Token], file: &Rc<str>, line_no: u32) -> Result<()> {
        let text = match tokens.get(1).map(|t| &t.kind) {
            Some(TokenKind::StringLit(s)) => self.expand_refs(s),
            _ => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: "expected prompt string after mainmenu".to_string(),
                })
            }
        };
        self.kc.mainmenu_text = Some(text);
        Ok(())
    }

    // ---- properties ----------------------------------------------------

    fn parse_properties(&mut self, ctx: PropContext) -> Result<PendingProps> {
        let mut props = PendingProps::default();
        loop {
            let Some((line, line_no, file)) = self.next_line() else { break };
            let tokens = tokenize_line(&line, &file, line_no)?;
            if tokens.is_empty() {
                continue;
            }
            let mut cursor = Cursor::new(&tokens);
            let handled = self.parse_one_property(ctx, &mut cursor, &file, line_no, &mut props)?;
            if !handled {
                self.push_back(line, line_no);
                break;
            }
        }
        Ok(props)
    }

    fn parse_one_property(
        &mut self,
        ctx: PropContext,
        cursor: &mut Cursor,
        file: &Rc<str>,
        line_no: u32,
        props: &mut PendingProps,
    ) -> Result<bool> {
        let kind = cursor.advance().kind.clone();
        match kind {
            TokenKind::Bool => {
                props.type_ = Some(SymType::Bool);
                self.maybe_inline_prompt(cursor, props, file, line_no)?;
            }
            TokenKind::Tristate => {
                props.type_ = Some(SymType::Tristate);
                self.maybe_inline_prompt(cursor, props, file, line_no)?;
            }
            TokenKind::StringType => {
                props.type_ = Some(SymType::String);
                self.maybe_inline_prompt(cursor, props, file, line_no)?;
            }
            TokenKind::Hex => {
                props.type_ = Some(SymType::Hex);
                self.maybe_inline_prompt(cursor, props, file, line_no)?;
            }
            TokenKind::Int => {
                props.type_ = Some(SymType::Int);
                self.maybe_inline_prompt(cursor, props, file, line_no)?;
            }
            TokenKind::DefBool => {
                props.type_ = Some(SymType::Bool);
                let value = self.parse_expr(cursor, file, line_no)?;
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.defaults.push((value, cond));
            }
            TokenKind::DefTristate => {
                props.type_ = Some(SymType::Tristate);
                let value = self.parse_expr(cursor, file, line_no)?;
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.defaults.push((value, cond));
            }
            TokenKind::Default if ctx == PropContext::Choice => {
                let target = cursor.expect_ident(file, line_no)?;
                let sym_id = self.kc.lookup_or_create(&target);
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.choice_defaults.push((sym_id, cond));
            }
            TokenKind::Default => {
                let value = self.parse_expr(cursor, file, line_no)?;
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.defaults.push((value, cond));
            }
            TokenKind::Range => {
                let lo = self.parse_expr(cursor, file, line_no)?;
                let hi = self.parse_expr(cursor, file, line_no)?;
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.ranges.push((lo, hi, cond));
            }
            TokenKind::Prompt => {
                let text = self.expand_refs(&cursor.expect_string(file, line_no)?);
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.prompt = Some((text, cond));
            }
            TokenKind::Depends => {
                cursor.expect(TokenKind::On, file, line_no)?;
                let expr = self.parse_expr(cursor, file, line_no)?;
                props.dep_accum = props.dep_accum.clone().and(expr);
            }
            TokenKind::Visible => {
                cursor.expect(TokenKind::If, file, line_no)?;
                let expr = self.parse_expr(cursor, file, line_no)?;
                props.visible_accum = props.visible_accum.clone().and(expr);
            }
            TokenKind::Select if ctx == PropContext::Config => {
                let target = cursor.expect_ident(file, line_no)?;
                let sym_id = self.kc.lookup_or_create(&target);
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.selects.push((sym_id, cond));
            }
            TokenKind::Imply if ctx == PropContext::Config => {
                let target = cursor.expect_ident(file, line_no)?;
                let sym_id = self.kc.lookup_or_create(&target);
                let cond = self.parse_opt_if(cursor, file, line_no)?;
                props.implies.push((sym_id, cond));
            }
            TokenKind::Optional if ctx == PropContext::Choice => {
                props.optional = true;
            }
            TokenKind::Option => {
                self.parse_option(cursor, file, line_no, props)?;
            }
            TokenKind::Help => {
                props.help = Some(self.collect_help_text(line_no));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn maybe_inline_prompt(
        &mut self,
        cursor: &mut Cursor,
        props: &mut PendingProps,
        file: &Rc<str>,
        line_no: u32,
    ) -> Result<()> {
        if let TokenKind::StringLit(_) = cursor.peek_kind() {
            let text = self.expand_refs(&cursor.expect_string(file, line_no)?);
            let cond = self.parse_opt_if(cursor, file, line_no)?;
            props.prompt = Some((text, cond));
        }
        Ok(())
    }

    fn parse_option(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32, props: &mut PendingProps) -> Result<()> {
        match cursor.advance().kind.clone() {
            TokenKind::Env => {
                cursor.expect(TokenKind::Eq, file, line_no)?;
                let var = cursor.expect_string(file, line_no)?;
                props.env = Some(var);
            }
            TokenKind::DefconfigList => {
                props.is_defconfig_list = true;
            }
            TokenKind::Modules => {
                props.is_modules = true;
            }
            TokenKind::AllNoConfigY => {
                props.allnoconfig_y = true;
            }
            TokenKind::Ident(opt) => {
                self.warn(Warning::UnknownOption {
                    location: Location { file: file.clone(), line: line_no },
                    option: opt,
                });
            }
            other => {
                return Err(KconfigError::Syntax {
                    location: Location { file: file.clone(), line: line_no },
                    message: format!("unexpected token after option: {other:?}"),
                })
            }
        }
        Ok(())
    }

    /// Collects `help` text: the following lines, indented deeper than the
    /// `help` line itself, with their common leading indentation stripped
    /// (tabs expand to 8 columns first).
    fn collect_help_text(&mut self, help_line: u32) -> String {
        let mut raw_lines: Vec<String> = Vec::new();
        loop {
            let Some(feeder) = self.feeders.last() else { break };
            let probe_no = help_line + 1 + raw_lines.len() as u32;
            let Some(raw) = feeder.raw_line(probe_no) else { break };
            if raw.trim().is_empty() {
                raw_lines.push(String::new());
                continue;
            }
            if expand_tabs(raw).starts_with(|c: char| !c.is_whitespace()) {
                break;
            }
            raw_lines.push(expand_tabs(raw));
        }
        while raw_lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            raw_lines.pop();
        }
        let indent = raw_lines
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        let text = raw_lines
            .iter()
            .map(|l| if l.len() >= indent { &l[indent..] } else { "" })
            .collect::<Vec<_>>()
            .join("\n");

        for _ in 0..raw_lines.len() {
            self.next_line();
        }
        text
    }

    fn parse_opt_if(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Option<Expr>> {
        if matches!(cursor.peek_kind(), TokenKind::If) {
            cursor.advance();
            Ok(Some(self.parse_expr(cursor, file, line_no)?))
        } else {
            Ok(None)
        }
    }

    // ---- expressions (OR < AND < comparison < primary) -----------------

    fn parse_expr(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Expr> {
        self.parse_or(cursor, file, line_no)
    }

    fn parse_or(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Expr> {
        let mut lhs = self.parse_and(cursor, file, line_no)?;
        while matches!(cursor.peek_kind(), TokenKind::Or) {
            cursor.advance();
            let rhs = self.parse_and(cursor, file, line_no)?;
            lhs = lhs.or(rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Expr> {
        let mut lhs = self.parse_comparison(cursor, file, line_no)?;
        while matches!(cursor.peek_kind(), TokenKind::And) {
            cursor.advance();
            let rhs = self.parse_comparison(cursor, file, line_no)?;
            lhs = lhs.and(rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Expr> {
        let lhs = self.parse_primary(cursor, file, line_no)?;
        let op = match cursor.peek_kind() {
            TokenKind::Eq => Some(TokenKind::Eq),
            TokenKind::NotEq => Some(TokenKind::NotEq),
            TokenKind::Less => Some(TokenKind::Less),
            TokenKind::LessEq => Some(TokenKind::LessEq),
            TokenKind::Greater => Some(TokenKind::Greater),
            TokenKind::GreaterEq => Some(TokenKind::GreaterEq),
            _ => None,
        };
        let Some(op) = op else { return Ok(lhs) };
        cursor.advance();
        let rhs = self.parse_primary(cursor, file, line_no)?;
        Ok(match op {
            TokenKind::Eq => Expr::Eq(Box::new(lhs), Box::new(rhs)),
            TokenKind::NotEq => Expr::NotEq(Box::new(lhs), Box::new(rhs)),
            TokenKind::Less => Expr::Less(Box::new(lhs), Box::new(rhs)),
            TokenKind::LessEq => Expr::LessEq(Box::new(lhs), Box::new(rhs)),
            TokenKind::Greater => Expr::Greater(Box::new(lhs), Box::new(rhs)),
            TokenKind::GreaterEq => Expr::GreaterEq(Box::new(lhs), Box::new(rhs)),
            _ => unreachable!(),
        })
    }

    fn parse_primary(&mut self, cursor: &mut Cursor, file: &Rc<str>, line_no: u32) -> Result<Expr> {
        match cursor.advance().kind.clone() {
            TokenKind::Not => {
                let inner = self.parse_primary(cursor, file, line_no)?;
                Ok(Expr::Not(Box::new(inner)))
            }
            TokenKind::OpenParen => {
                let inner = self.parse_or(cursor, file, line_no)?;
                cursor.expect(TokenKind::CloseParen, file, line_no)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => Ok(Expr::Symbol(self.kc.lookup_or_create(&name))),
            TokenKind::StringLit(s) => Ok(Expr::Const(s)),
            other => Err(KconfigError::Syntax {
                location: Location { file: file.clone(), line: line_no },
                message: format!("expected expression, found {other:?}"),
            }),
        }
    }

    // ---- $NAME expansion (§4.3) ------------------------------------------

    fn expand_refs(&self, text: &str) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                    j += 1;
                }
                if j > start {
                    let name = &text[start..j];
                    out.push_str(&self.resolve_ref(name));
                    i = j;
                    continue;
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        }
        out
    }

    /// §4.3 leaves the symbol-reference source unspecified beyond "current
    /// value of the symbol"; we resolve against the process environment
    /// first (matching `option env`'s own source of truth) and fall back to
    /// the symbol table, so `source "$ARCH/Kconfig"` works whether `ARCH`
    /// is an environment variable or a Kconfig symbol.
    fn resolve_ref(&self, name: &str) -> String {
        if let Ok(v) = std::env::var(name) {
            return v;
        }
        match self.kc.lookup(name) {
            Some(id) => self.kc.value(id),
            None => String::new(),
        }
    }

    fn warn(&mut self, w: Warning) {
        if self.kc.options.warnings_enabled {
            w.log();
        }
        self.warnings.push(w);
    }

    fn apply_symbol_properties(
        &mut self,
        node: NodeId,
        sym_id: SymbolId,
        props: PendingProps,
        file: &Rc<str>,
        line_no: u32,
        enclosing_dep: &Expr,
        enclosing_visible: &Expr,
    ) {
        let dep = enclosing_dep.clone().and(props.dep_accum);
        self.kc.node_mut(node).dep = dep.clone();

        if let Some(t) = props.type_ {
            self.kc.sym(sym_id).type_.set(t);
        }

        if let Some((text, cond)) = props.prompt {
            let final_cond = cond.unwrap_or_else(Expr::yes).and(dep.clone()).and(enclosing_visible.clone());
            self.kc.node_mut(node).prompt = Some((text, Some(final_cond)));
        }

        for (value, cond) in props.defaults {
            let final_cond = cond.unwrap_or_else(Expr::yes).and(dep.clone());
            self.kc.sym(sym_id).defaults.borrow_mut().push((value, Some(final_cond)));
        }
        if let Some(var) = &props.env {
            *self.kc.sym(sym_id).env_var.borrow_mut() = Some(var.clone());
            match std::env::var(var) {
                Ok(v) => {
                    self.kc
                        .sym(sym_id)
                        .defaults
                        .borrow_mut()
                        .push((Expr::Const(v), Some(dep.clone())));
                }
                Err(_) => self.warn(Warning::UndefinedEnvVar {
                    location: Location { file: file.clone(), line: line_no },
                    var: var.clone(),
                }),
            }
        }
        for (lo, hi, cond) in props.ranges {
            let final_cond = cond.unwrap_or_else(Expr::yes).and(dep.clone());
            self.kc.sym(sym_id).ranges.borrow_mut().push((lo, hi, Some(final_cond)));
        }
        for (target, cond) in props.selects {
            let final_cond = cond.clone().unwrap_or_else(Expr::yes).and(dep.clone());
            self.kc
                .sym(target)
                .rev_dep
                .borrow_mut()
                .or_assign(Expr::Symbol(sym_id).and(final_cond));
            self.kc.sym(sym_id).selects.borrow_mut().push((target, cond));
        }
        for (target, cond) in props.implies {
            let final_cond = cond.clone().unwrap_or_else(Expr::yes).and(dep.clone());
            self.kc
                .sym(target)
                .weak_rev_dep
                .borrow_mut()
                .or_assign(Expr::Symbol(sym_id).and(final_cond));
            self.kc.sym(sym_id).implies.borrow_mut().push((target, cond));
        }
        if let Some(help) = props.help {
            self.kc.node_mut(node).help = Some(help);
        }
        if props.allnoconfig_y {
            self.kc.sym(sym_id).is_allnoconfig_y.set(true);
        }
        if props.is_modules {
            if self.kc.sym(sym_id).name == "MODULES" {
                self.kc.modules_sym = Some(sym_id);
            } else {
                self.warn(Warning::ModulesOptionOnWrongSymbol {
                    location: Location { file: file.clone(), line: line_no },
                    symbol: self.kc.sym(sym_id).name.clone(),
                });
            }
        }
        if props.is_defconfig_list {
            if self.kc.defconfig_list_sym.is_some() {
                self.warn(Warning::DuplicateDefconfigList {
                    location: Location { file: file.clone(), line: line_no },
                });
            } else {
                self.kc.defconfig_list_sym = Some(sym_id);
            }
        }

        self.kc.sym(sym_id).direct_deps.borrow_mut().or_assign(dep);
    }
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let spaces = 8 - (col % 8);
            out.push_str(&" ".repeat(spaces));
            col += spaces;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropContext {
    Config,
    Menu,
    Choice,
    Comment,
}

#[derive(Default)]
struct PendingProps {
    dep_accum: Expr,
    visible_accum: Expr,
    prompt: Option<(String, Option<Expr>)>,
    type_: Option<SymType>,
    defaults: Vec<(Expr, Option<Expr>)>,
    ranges: Vec<(Expr, Expr, Option<Expr>)>,
    selects: Vec<(SymbolId, Option<Expr>)>,
    implies: Vec<(SymbolId, Option<Expr>)>,
    choice_defaults: Vec<(SymbolId, Option<Expr>)>,
    optional: bool,
    help: Option<String>,
    env: Option<String>,
    is_defconfig_list: bool,
    is_modules: bool,
    allnoconfig_y: bool,
}

struct Cursor<'t> {
    tokens: &'t [Token],
    idx: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, idx: 0 }
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.idx)
            .map(|t| t.kind.clone())
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        match self.tokens.get(self.idx) {
            Some(t) => {
                self.idx += 1;
                t.clone()
            }
            None => Token { kind: TokenKind::Eof },
        }
    }

    fn expect(&mut self, kind: TokenKind, file: &Rc<str>, line_no: u32) -> Result<()> {
        let tok = self.advance();
        if tok.kind == kind {
            Ok(())
        } else {
            Err(KconfigError::Syntax {
                location: Location { file: file.clone(), line: line_no },
                message: format!("expected {kind:?}, found {:?}", tok.kind),
            })
        }
    }

    fn expect_ident(&mut self, file: &Rc<str>, line_no: u32) -> Result<String> {
        match self.advance().kind.clone() {
            TokenKind::Ident(s) => Ok(s),
            other => Err(KconfigError::Syntax {
                location: Location { file: file.clone(), line: line_no },
                message: format!("expected identifier, found {other:?}"),
            }),
        }
    }

    fn expect_string(&mut self, file: &Rc<str>, line_no: u32) -> Result<String> {
        match self.advance().kind.clone() {
            TokenKind::StringLit(s) => Ok(s),
            other => Err(KconfigError::Syntax {
                location: Location { file: file.clone(), line: line_no },
                message: format!("expected string literal, found {other:?}"),
            }),
        }
    }
}
