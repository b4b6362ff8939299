//! Recursive-descent arithmetic evaluator behind the `math` and
//! `setmemlimit` built-ins.
//!
//! Grammar, one left-to-right pass, no backtracking:
//!
//! ```text
//! expression := term (('+'|'-') term)*
//! term       := texp (('*'|'/'|'//') texp)*      // '//' truncates toward zero
//! texp       := factor ('^' factor)*             // left-associative
//! factor     := number | "pi" | "e" | '(' expression ')'
//!             | '-' factor | '!' factor
//!             | 's' factor | 'c' factor | 't' factor | 'l' factor
//!             | <any other character>            // consumed, contributes 0
//! number     := digit+ ('.' digit+)?
//! ```
//!
//! The evaluator has no error channel: unrecognized characters are consumed
//! and contribute 0, so malformed input degrades to a best-effort value.
//! `^` chains left-associatively (`2^3^2 == 64`), and `!`, `s`, `c`, `t`,
//! `l` are prefix operators consuming exactly one factor.

/// Evaluator holding its own cursor, so independent evaluations never share
/// state.
pub struct Evaluator {
    input: Vec<char>,
    pos: usize,
}

impl Evaluator {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Consume the whole input and produce its value.
    pub fn evaluate(mut self) -> f64 {
        self.expression()
    }

    fn peek(&self) -> char {
        self.input.get(self.pos).copied().unwrap_or('\0')
    }

    fn get(&mut self) -> char {
        let ch = self.peek();
        if self.pos < self.input.len() {
            self.pos += 1;
        }
        ch
    }

    fn number(&mut self) -> f64 {
        let mut result = f64::from(self.get() as u8 - b'0');
        while self.peek().is_ascii_digit() {
            result = result * 10.0 + f64::from(self.get() as u8 - b'0');
        }
        if self.peek() == '.' {
            self.get();
            let mut scale = 0.1;
            while self.peek().is_ascii_digit() {
                result += f64::from(self.get() as u8 - b'0') * scale;
                scale /= 10.0;
            }
        }
        result
    }

    fn factor(&mut self) -> f64 {
        match self.peek() {
            c if c.is_ascii_digit() => self.number(),
            'p' => {
                self.get();
                // "pi"; a lone 'p' contributes 0
                if self.peek() == 'i' {
                    self.get();
                    std::f64::consts::PI
                } else {
                    0.0
                }
            }
            'e' => {
                self.get();
                std::f64::consts::E
            }
            '(' => {
                self.get();
                let result = self.expression();
                self.get(); // ')'
                result
            }
            '-' => {
                self.get();
                -self.factor()
            }
            '!' => {
                self.get();
                let x = self.factor();
                factorial(x)
            }
            's' => {
                self.get();
                self.factor().sin()
            }
            'c' => {
                self.get();
                self.factor().cos()
            }
            't' => {
                self.get();
                self.factor().tan()
            }
            'l' => {
                self.get();
                self.factor().ln()
            }
            _ => {
                self.get();
                0.0
            }
        }
    }

    fn texp(&mut self) -> f64 {
        let mut result = self.factor();
        while self.peek() == '^' {
            self.get();
            result = result.powf(self.factor());
        }
        result
    }

    fn term(&mut self) -> f64 {
        let mut result = self.texp();
        loop {
            match self.peek() {
                '*' => {
                    self.get();
                    result *= self.texp();
                }
                '/' => {
                    self.get();
                    if self.peek() == '/' {
                        while self.peek() == '/' {
                            self.get();
                        }
                        result = (result / self.texp()).trunc();
                    } else {
                        result /= self.texp();
                    }
                }
                _ => break,
            }
        }
        result
    }

    fn expression(&mut self) -> f64 {
        let mut result = self.term();
        loop {
            match self.peek() {
                '+' => {
                    self.get();
                    result += self.term();
                }
                '-' => {
                    self.get();
                    result -= self.term();
                }
                _ => break,
            }
        }
        result
    }
}

/// Iterative product `1 * 2 * ... * floor(x)`.
///
/// For x below 1 the loop body never runs and the result is 1; fractional
/// input is an unchecked approximation, not a rejected value.
fn factorial(x: f64) -> f64 {
    let mut product = 1.0;
    let mut i = 1.0;
    while i <= x {
        product *= i;
        i += 1.0;
    }
    product
}

/// Evaluate an expression string to a floating-point value.
pub fn evaluate(input: &str) -> f64 {
    Evaluator::new(input).evaluate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_additive_and_multiplicative_precedence() {
        assert_eq!(evaluate("2+3*4"), 14.0);
        assert_eq!(evaluate("10-2-3"), 5.0);
        assert_eq!(evaluate("18/3/2"), 3.0);
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(evaluate("(2+3)*4"), 20.0);
        assert_eq!(evaluate("-(-5)"), 5.0);
    }

    #[test]
    fn test_power_is_left_associative() {
        // (2^3)^2, not 2^(3^2)
        assert_eq!(evaluate("2^3^2"), 64.0);
        assert_eq!(evaluate("2^10"), 1024.0);
    }

    #[test]
    fn test_prefix_factorial() {
        assert_eq!(evaluate("!5"), 120.0);
        assert_eq!(evaluate("!0"), 1.0);
        // Negative input: the product loop never runs.
        assert_eq!(evaluate("!-3"), 1.0);
        // Binds one factor: !3+1 is (3!)+1.
        assert_eq!(evaluate("!3+1"), 7.0);
    }

    #[test]
    fn test_truncating_division() {
        assert_eq!(evaluate("7//2"), 3.0);
        // Truncation is toward zero.
        assert_eq!(evaluate("(0-7)//2"), -3.0);
        // Extra slashes are swallowed.
        assert_eq!(evaluate("7///2"), 3.0);
    }

    #[test]
    fn test_decimal_numbers() {
        assert!(close(evaluate("3.25+0.75"), 4.0));
        assert!(close(evaluate("0.5*4"), 2.0));
    }

    #[test]
    fn test_constants() {
        assert!(close(evaluate("pi"), std::f64::consts::PI));
        assert!(close(evaluate("e"), std::f64::consts::E));
        // 'p' not followed by 'i' contributes 0.
        assert_eq!(evaluate("p+1"), 1.0);
    }

    #[test]
    fn test_transcendental_prefixes() {
        assert!(close(evaluate("s0"), 0.0));
        assert!(close(evaluate("c0"), 1.0));
        assert!(close(evaluate("t0"), 0.0));
        assert!(close(evaluate("le"), 1.0));
        assert!(close(evaluate("spi"), 0.0));
    }

    #[test]
    fn test_unrecognized_characters_contribute_zero() {
        assert_eq!(evaluate("2+@"), 2.0);
        assert_eq!(evaluate("@"), 0.0);
        assert_eq!(evaluate(""), 0.0);
    }

    #[test]
    fn test_evaluator_is_reentrant() {
        let first = Evaluator::new("1+1");
        let second = Evaluator::new("2*2");
        assert_eq!(second.evaluate(), 4.0);
        assert_eq!(first.evaluate(), 2.0);
    }
}
