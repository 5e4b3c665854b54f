#[cfg(test)]
mod test_full_program_flow;
#[cfg(test)]
mod utils;
