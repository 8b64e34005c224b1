// Copyright 2026 The Morphoc Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Parser for the startup directive file: the top-level configuration
//! naming the geometry, the channel mechanisms, what to record or clamp,
//! and the parameter rules to resolve onto the model.

use crate::common::{Result, located};
use crate::datamodel::{Channel, Parameter, StartupInfo, TraceDirective};
use crate::scan::{TagEvent, strip_comment, tag_event};
use crate::startup_err;

/// The block tags the startup format allows; at most one may be open.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Block {
    Channel,
    Parameter,
}

impl Block {
    fn keyword(self) -> &'static str {
        match self {
            Block::Channel => "channel",
            Block::Parameter => "parameter",
        }
    }

    fn from_name(name: &str) -> Option<Block> {
        match name {
            "channel" => Some(Block::Channel),
            "parameter" => Some(Block::Parameter),
            _ => None,
        }
    }
}

struct StartupParser<'a> {
    origin: &'a str,
    open: Option<Block>,
    info: StartupInfo,
}

/// Parses startup text into a [`StartupInfo`].  `origin` labels the source
/// in error messages (normally the file path).
pub fn parse_startup(source: &str, origin: &str) -> Result<StartupInfo> {
    let mut parser = StartupParser {
        origin,
        open: None,
        info: StartupInfo::new(),
    };

    let mut line_count = 0;
    for (idx, raw_line) in source.lines().enumerate() {
        line_count = idx + 1;
        parser.handle_line(line_count, raw_line)?;
    }

    if let Some(block) = parser.open {
        return startup_err!(
            UnclosedTag,
            located(
                origin,
                line_count,
                &format!("tag '{}' still open at end of file", block.keyword()),
            )
        );
    }

    Ok(parser.info)
}

impl<'a> StartupParser<'a> {
    fn handle_line(&mut self, line_num: usize, raw_line: &str) -> Result<()> {
        let mut tokens: Vec<&str> = strip_comment(raw_line).split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(());
        }

        if let Some(event) = tag_event(tokens[0]) {
            let event = match event {
                Ok(event) => event,
                Err(msg) => {
                    return startup_err!(MalformedTag, located(self.origin, line_num, &msg));
                }
            };
            if tokens.len() > 1 {
                return startup_err!(
                    BadLineArity,
                    located(self.origin, line_num, "tag must be alone on its line")
                );
            }
            return self.handle_tag(line_num, event);
        }

        // a line inside an open block reads as if prefixed by its keyword
        let keyword = if let Some(block) = self.open {
            tokens.insert(0, block.keyword());
            block.keyword().to_string()
        } else {
            tokens[0].to_ascii_lowercase()
        };

        match keyword.as_str() {
            "geometry" => {
                self.expect_arity(line_num, &tokens, 2)?;
                self.info.geometry_file = tokens[1].to_string();
                Ok(())
            }
            "channeldir" => {
                self.expect_arity(line_num, &tokens, 2)?;
                self.info.channel_dir = tokens[1].to_string();
                Ok(())
            }
            "time" => {
                self.expect_arity(line_num, &tokens, 2)?;
                self.info.stop_time = self.parse_f64(line_num, tokens[1])?;
                Ok(())
            }
            "record" => {
                self.expect_arity(line_num, &tokens, 4)?;
                let dt = self.parse_f64(line_num, tokens[2])?;
                self.info.traces.push(TraceDirective::Record {
                    target: tokens[1].to_string(),
                    dt,
                    file: tokens[3].to_string(),
                });
                Ok(())
            }
            "clamp" => {
                self.expect_arity(line_num, &tokens, 5)?;
                let trace_num = self.parse_usize(line_num, tokens[3])?;
                self.info.traces.push(TraceDirective::Clamp {
                    target: tokens[1].to_string(),
                    file: tokens[2].to_string(),
                    trace_num,
                });
                Ok(())
            }
            "fit" => {
                self.expect_arity(line_num, &tokens, 5)?;
                let trace_num = self.parse_usize(line_num, tokens[3])?;
                let tau = self.parse_f64(line_num, tokens[4])?;
                self.info.traces.push(TraceDirective::Fit {
                    target: tokens[1].to_string(),
                    file: tokens[2].to_string(),
                    trace_num,
                    tau,
                });
                Ok(())
            }
            "channel" => self.handle_channel(line_num, &tokens),
            "parameter" => self.handle_parameter(line_num, &tokens),
            _ => startup_err!(
                UnknownKeyword,
                located(
                    self.origin,
                    line_num,
                    &format!("unknown keyword '{}'", tokens[0]),
                )
            ),
        }
    }

    fn handle_tag(&mut self, line_num: usize, event: TagEvent) -> Result<()> {
        match event {
            TagEvent::Open(name) => {
                if let Some(block) = self.open {
                    return startup_err!(
                        TagAlreadyOpen,
                        located(
                            self.origin,
                            line_num,
                            &format!(
                                "cannot open tag '{name}' while '{}' is open",
                                block.keyword(),
                            ),
                        )
                    );
                }
                match Block::from_name(&name) {
                    Some(block) => {
                        self.open = Some(block);
                        Ok(())
                    }
                    None => startup_err!(
                        UnknownKeyword,
                        located(self.origin, line_num, &format!("unknown tag '{name}'"))
                    ),
                }
            }
            TagEvent::Close(name) => self.close_block(line_num, &name),
        }
    }

    fn close_block(&mut self, line_num: usize, name: &str) -> Result<()> {
        match self.open {
            Some(block) if block.keyword() == name => {
                self.open = None;
                Ok(())
            }
            _ => startup_err!(
                TagNotOpen,
                located(
                    self.origin,
                    line_num,
                    &format!("closing tag '{name}' that is not open"),
                )
            ),
        }
    }

    fn handle_channel(&mut self, line_num: usize, tokens: &[&str]) -> Result<()> {
        match tokens.len() {
            2 if tokens[1] == "</channel>" => self.close_block(line_num, "channel"),
            3 => {
                self.info.channels.push(Channel {
                    mechanism: tokens[1].to_string(),
                    tag: tokens[2].to_string(),
                });
                Ok(())
            }
            _ => startup_err!(
                BadLineArity,
                located(
                    self.origin,
                    line_num,
                    "channel line must be '<mechanism> <tag>'",
                )
            ),
        }
    }

    fn handle_parameter(&mut self, line_num: usize, tokens: &[&str]) -> Result<()> {
        match tokens.len() {
            2 if tokens[1] == "</parameter>" => self.close_block(line_num, "parameter"),
            3 => {
                let value = self.parse_f64(line_num, tokens[2])?;
                self.info
                    .parameters
                    .push(Parameter::constant(tokens[1], value));
                Ok(())
            }
            4 => {
                let min = self.parse_f64(line_num, tokens[2])?;
                let max = self.parse_f64(line_num, tokens[3])?;
                self.push_range(line_num, tokens[1], min, max, min, max)
            }
            6 => {
                let min = self.parse_f64(line_num, tokens[2])?;
                let max = self.parse_f64(line_num, tokens[3])?;
                let start_min = self.parse_f64(line_num, tokens[4])?;
                let start_max = self.parse_f64(line_num, tokens[5])?;
                self.push_range(line_num, tokens[1], min, max, start_min, start_max)
            }
            _ => startup_err!(
                BadLineArity,
                located(
                    self.origin,
                    line_num,
                    "parameter line must be '<name> <value>', '<name> <min> <max>' \
                     or '<name> <min> <max> <startMin> <startMax>'",
                )
            ),
        }
    }

    fn push_range(
        &mut self,
        line_num: usize,
        name: &str,
        min: f64,
        max: f64,
        start_min: f64,
        start_max: f64,
    ) -> Result<()> {
        match Parameter::with_range(name, min, max, start_min, start_max) {
            Ok(param) => {
                self.info.parameters.push(param);
                Ok(())
            }
            Err(msg) => startup_err!(
                BadParameterRange,
                located(self.origin, line_num, &msg)
            ),
        }
    }

    fn expect_arity(&self, line_num: usize, tokens: &[&str], arity: usize) -> Result<()> {
        if tokens.len() != arity {
            return startup_err!(
                BadLineArity,
                located(
                    self.origin,
                    line_num,
                    &format!(
                        "'{}' takes {} arguments, got {}",
                        tokens[0],
                        arity - 1,
                        tokens.len() - 1,
                    ),
                )
            );
        }
        Ok(())
    }

    fn parse_f64(&self, line_num: usize, token: &str) -> Result<f64> {
        match token.parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => startup_err!(
                ExpectedNumber,
                located(self.origin, line_num, &format!("expected a number, got '{token}'"))
            ),
        }
    }

    fn parse_usize(&self, line_num: usize, token: &str) -> Result<usize> {
        match token.parse::<usize>() {
            Ok(value) => Ok(value),
            Err(_) => startup_err!(
                ExpectedInteger,
                located(
                    self.origin,
                    line_num,
                    &format!("expected a non-negative integer, got '{token}'"),
                )
            ),
        }
    }
}
