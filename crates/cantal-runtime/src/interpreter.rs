use cantal_core::{AssignTarget, BlockId, CantalError, EventName, Script, Statement, Value};

use crate::eval::{evaluate, evaluate_all, EvalContext};
use crate::host::FunctionOutcome;

/// Statements one interpreter may execute per frame before yielding.
pub const DEFAULT_STATEMENT_BUDGET: usize = 100;

/// Everything a running handler reaches outside its own block stack.
pub trait ExecutionContext: EvalContext {
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<FunctionOutcome, CantalError>;

    fn write(&mut self, target: &AssignTarget, value: Value) -> Result<(), CantalError>;
}

/// Why an interpreter handed control back to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing was started or resumed.
    Idle,
    /// The block stack emptied.
    Finished,
    /// The per-frame statement budget ran out; resumes on the next frame.
    FrameBudgetExhausted,
    /// A blocking call is waiting on a timer of this length.
    Waiting { duration_ms: u64 },
    /// A register write or an explicit request needs state selection re-run
    /// before execution may continue.
    StateReselect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockFrame {
    block: BlockId,
    index: usize,
}

/// Executes one event handler of one state, a slice of statements at a time.
#[derive(Debug, Clone)]
pub struct Interpreter {
    event: EventName,
    entry: BlockId,
    budget: usize,
    frames: Vec<BlockFrame>,
    running: bool,
    statements_this_frame: usize,
    waiting_for_frame: bool,
    suspended: bool,
    should_loop_after_finish: bool,
    executed_statements: u64,
}

impl Interpreter {
    pub fn new(event: EventName, entry: BlockId, budget: usize) -> Self {
        Self {
            event,
            entry,
            budget,
            frames: Vec::new(),
            running: false,
            statements_this_frame: 0,
            waiting_for_frame: false,
            suspended: false,
            should_loop_after_finish: false,
            executed_statements: 0,
        }
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_waiting_for_frame(&self) -> bool {
        self.waiting_for_frame
    }

    /// True while a blocking call waits for its timer.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn should_loop_after_finish(&self) -> bool {
        self.should_loop_after_finish
    }

    pub fn block_depth(&self) -> usize {
        self.frames.len()
    }

    /// Statements executed since creation, across frames and resets.
    pub fn executed_statements(&self) -> u64 {
        self.executed_statements
    }

    pub fn statements_this_frame(&self) -> usize {
        self.statements_this_frame
    }

    pub fn current_position(&self) -> Option<(BlockId, usize)> {
        self.frames.last().map(|frame| (frame.block, frame.index))
    }

    /// Starts the handler from its first statement. No-op when already
    /// running or when the handler body is empty.
    pub fn run<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        if self.running {
            return Ok(StepOutcome::Idle);
        }
        let empty = script
            .block(self.entry)
            .map(|block| block.is_empty())
            .unwrap_or(true);
        if empty {
            return Ok(StepOutcome::Idle);
        }

        self.running = true;
        self.frames.push(BlockFrame {
            block: self.entry,
            index: 0,
        });
        self.execute(script, ctx)
    }

    /// Frame tick: clears the statement budget, restarts a finished loop
    /// handler and resumes a handler that ran out of budget.
    pub fn on_new_frame<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        self.statements_this_frame = 0;
        if self.should_loop_after_finish {
            self.should_loop_after_finish = false;
            return self.run(script, ctx);
        }
        if self.waiting_for_frame {
            self.waiting_for_frame = false;
            return self.execute(script, ctx);
        }
        Ok(StepOutcome::Idle)
    }

    /// Moves past the blocking call once its timer fired.
    pub fn resume<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        if !self.suspended {
            return Ok(StepOutcome::Idle);
        }
        self.suspended = false;
        self.advance();
        self.execute(script, ctx)
    }

    /// Continues after a [`StepOutcome::StateReselect`] that kept the state.
    pub fn proceed<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        if !self.running || self.suspended || self.waiting_for_frame {
            return Ok(StepOutcome::Idle);
        }
        self.execute(script, ctx)
    }

    /// Drops the block stack and every pending flag.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.running = false;
        self.statements_this_frame = 0;
        self.waiting_for_frame = false;
        self.suspended = false;
        self.should_loop_after_finish = false;
    }

    fn advance(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.index += 1;
        }
    }

    fn finish(&mut self) -> StepOutcome {
        self.running = false;
        if self.event == EventName::Loop {
            self.should_loop_after_finish = true;
        }
        StepOutcome::Finished
    }

    fn execute<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        let outcome = self.execute_statements(script, ctx);
        if outcome.is_err() {
            self.reset();
        }
        outcome
    }

    fn execute_statements<C: ExecutionContext>(
        &mut self,
        script: &Script,
        ctx: &mut C,
    ) -> Result<StepOutcome, CantalError> {
        loop {
            let Some(frame) = self.frames.last().copied() else {
                return Ok(self.finish());
            };
            let statements = script
                .block(frame.block)
                .map(|block| block.statements.as_slice())
                .unwrap_or_default();
            let Some(statement) = statements.get(frame.index) else {
                self.frames.pop();
                continue;
            };

            if self.statements_this_frame >= self.budget {
                self.waiting_for_frame = true;
                return Ok(StepOutcome::FrameBudgetExhausted);
            }
            self.statements_this_frame += 1;
            self.executed_statements += 1;

            match statement {
                Statement::If {
                    condition,
                    then_block,
                    else_block,
                    ..
                } => {
                    let passed = evaluate(condition, ctx)?.is_truthy();
                    self.advance();
                    let branch = if passed { Some(*then_block) } else { *else_block };
                    if let Some(block) = branch {
                        self.frames.push(BlockFrame { block, index: 0 });
                    }
                }
                Statement::Call { name, args, .. } => {
                    let values = evaluate_all(args, ctx)?;
                    match ctx.call_function(name, &values)? {
                        FunctionOutcome::Continue => self.advance(),
                        FunctionOutcome::Wait { duration_ms } => {
                            self.suspended = true;
                            return Ok(StepOutcome::Waiting { duration_ms });
                        }
                        FunctionOutcome::Reselect => {
                            self.advance();
                            return Ok(StepOutcome::StateReselect);
                        }
                    }
                }
                Statement::Affectation { target, value, .. } => {
                    let value = evaluate(value, ctx)?;
                    ctx.write(target, value)?;
                    self.advance();
                    return Ok(StepOutcome::StateReselect);
                }
            }
        }
    }
}
